//! Planner (spec §4.8).
//!
//! Orders the Scanner's unordered transaction set into journal order,
//! detects rename collisions (marking losers `SKIPPED`), and breaks
//! rename cycles (A↔B) by staging through a temporary name. Plain,
//! newly-authored deterministic-sort/graph code -- the teacher never
//! renames paths, so there is no teacher precedent here -- but it follows
//! the crate's existing error-variant-per-failure-mode style.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::{Transaction, TransactionKind, TransactionStatus};

#[derive(Debug, Clone)]
pub struct CollisionRecord {
    pub path: PathBuf,
    pub destination: PathBuf,
    pub kind: TransactionKind,
}

fn normalize_key(path: &Path) -> String {
    path.to_string_lossy().to_ascii_lowercase()
}

fn depth(path: &Path) -> usize {
    path.components().count()
}

/// Plan execution order and resolve collisions/cycles. `root` is the scan
/// root, used to check renames against untouched filesystem entries.
pub fn plan(mut transactions: Vec<Transaction>, root: &Path) -> (Vec<Transaction>, Vec<CollisionRecord>) {
    let collisions = resolve_collisions(&mut transactions, root);
    break_cycles(&mut transactions);
    let ordered = order_transactions(transactions);
    (ordered, collisions)
}

/// Collision detection (spec §4.8): two active renames targeting the same
/// case-insensitive-normalized path, or a rename targeting an existing,
/// untouched filesystem entry. Default policy: SKIPPED.
fn resolve_collisions(transactions: &mut [Transaction], root: &Path) -> Vec<CollisionRecord> {
    let mut collisions = Vec::new();

    // Map target-key -> index of the first rename claiming it.
    let mut claimed: HashMap<String, usize> = HashMap::new();
    let rename_sources: std::collections::HashSet<String> = transactions
        .iter()
        .filter(|t| t.kind.is_rename())
        .map(|t| normalize_key(&t.path))
        .collect();

    for i in 0..transactions.len() {
        if !transactions[i].kind.is_rename() || transactions[i].status == TransactionStatus::Skipped {
            continue;
        }
        let Some(new_path) = transactions[i].new_path.clone() else {
            continue;
        };
        let key = normalize_key(&new_path);

        if let Some(&first_idx) = claimed.get(&key) {
            let other_path = transactions[first_idx].path.clone();
            collisions.push(CollisionRecord {
                path: transactions[i].path.clone(),
                destination: new_path.clone(),
                kind: transactions[i].kind,
            });
            transactions[i].mark_collision(other_path);
            transactions[i].transition_skipped("destination collides with another planned rename");
            continue;
        }

        // An existing filesystem entry at the destination that isn't itself
        // one of our own rename sources is also a collision.
        let absolute = root.join(&new_path);
        if absolute.symlink_metadata().is_ok() && !rename_sources.contains(&key) {
            collisions.push(CollisionRecord {
                path: transactions[i].path.clone(),
                destination: new_path.clone(),
                kind: transactions[i].kind,
            });
            transactions[i].mark_collision(new_path);
            transactions[i].transition_skipped("destination already exists on disk");
            continue;
        }

        claimed.insert(key, i);
    }

    collisions
}

/// Break rename cycles (A->B, B->A, ...) by staging the first transaction
/// in each cycle through a unique temporary name, then re-pointing the
/// last transaction in the cycle at the original target.
fn break_cycles(transactions: &mut Vec<Transaction>) {
    loop {
        let active: Vec<usize> = (0..transactions.len())
            .filter(|&i| transactions[i].kind.is_rename() && transactions[i].status != TransactionStatus::Skipped)
            .collect();

        let mut target_of: HashMap<String, usize> = HashMap::new();
        for &i in &active {
            if let Some(new_path) = &transactions[i].new_path {
                target_of.insert(normalize_key(&transactions[i].path), i);
                let _ = new_path;
            }
        }

        let mut cycle = None;
        'outer: for &start in &active {
            let mut seen = vec![start];
            let mut current = start;
            loop {
                let Some(new_path) = transactions[current].new_path.clone() else {
                    continue 'outer;
                };
                let key = normalize_key(&new_path);
                let Some(&next) = target_of.get(&key) else {
                    continue 'outer;
                };
                if next == start {
                    cycle = Some(seen);
                    break 'outer;
                }
                if seen.contains(&next) {
                    continue 'outer;
                }
                seen.push(next);
                current = next;
            }
        }

        let Some(cycle_indices) = cycle else {
            break;
        };
        if cycle_indices.len() < 2 {
            break;
        }

        let first = cycle_indices[0];
        let last = *cycle_indices.last().unwrap();
        let original_target = transactions[first].new_path.clone().unwrap();
        let tmp_name = format!(
            "{}.refold-tmp-{}",
            original_target.file_name().and_then(|n| n.to_str()).unwrap_or("x"),
            &transactions[first].id[..8.min(transactions[first].id.len())]
        );
        let tmp_path = original_target.with_file_name(tmp_name);

        // Each step in `cycle_indices` only vacates the path the next step
        // needs, so the chain must execute in exactly this order -- not
        // whatever order `order_transactions`'s per-path lexicographic sort
        // would otherwise give it. Stamp a shared group id and an ascending
        // index so `order_transactions` can keep the chain atomic.
        let cycle_group = transactions[first].id.clone();
        for (step, &idx) in cycle_indices.iter().enumerate() {
            transactions[idx].cycle_group = Some(cycle_group.clone());
            transactions[idx].cycle_index = step as u32;
        }

        transactions[first].new_path = Some(tmp_path.clone());
        let mut restore = Transaction::new_rename(transactions[last].kind, tmp_path, original_target);
        restore.cycle_group = Some(cycle_group);
        restore.cycle_index = cycle_indices.len() as u32;
        transactions.push(restore);
    }
}

/// Deterministic execution order: per-file content edits before that
/// file's own rename, folders deepest-first after all file-level work,
/// informational binary-match transactions last.
///
/// Transactions produced by `break_cycles` carry a `cycle_group`/
/// `cycle_index` and are kept together as one atomic, internally-ordered
/// unit rather than being individually sorted by path: a cycle-break
/// chain's whole point is that step N vacates the path step N+1 needs, so
/// its order is fixed at detection time, not by this function.
fn order_transactions(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut content_and_file: Vec<Transaction> = Vec::new();
    let mut folders: Vec<Transaction> = Vec::new();
    let mut binary: Vec<Transaction> = Vec::new();

    for tx in transactions {
        match tx.kind {
            TransactionKind::FolderName => folders.push(tx),
            TransactionKind::FileContentBinaryMatch => binary.push(tx),
            _ => content_and_file.push(tx),
        }
    }

    let mut plain: Vec<Transaction> = Vec::new();
    let mut cycle_chains: HashMap<String, Vec<Transaction>> = HashMap::new();
    for tx in content_and_file {
        match tx.cycle_group.clone() {
            Some(group) => cycle_chains.entry(group).or_default().push(tx),
            None => plain.push(tx),
        }
    }

    let mut groups: HashMap<String, Vec<Transaction>> = HashMap::new();
    let mut group_order: Vec<String> = Vec::new();
    for tx in plain {
        let key = tx.path.to_string_lossy().into_owned();
        if !groups.contains_key(&key) {
            group_order.push(key.clone());
        }
        groups.entry(key).or_default().push(tx);
    }

    // Each unit is keyed by a representative path so the overall order
    // stays deterministic; a chain sorts under its first step's source
    // path and its members are never reordered relative to each other.
    let mut units: Vec<(String, Vec<Transaction>)> = group_order
        .into_iter()
        .map(|key| {
            let mut group = groups.remove(&key).unwrap();
            group.sort_by_key(|t| match t.kind {
                TransactionKind::FileContentLine => (0, t.line_number.unwrap_or(0)),
                _ => (1, 0),
            });
            (key, group)
        })
        .collect();

    for (_, mut chain) in cycle_chains {
        chain.sort_by_key(|t| t.cycle_index);
        let key = chain[0].path.to_string_lossy().into_owned();
        units.push((key, chain));
    }
    units.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    for (_, group) in units {
        out.extend(group);
    }

    folders.sort_by(|a, b| depth(&b.path).cmp(&depth(&a.path)).then_with(|| a.path.cmp(&b.path)));
    out.extend(folders);

    binary.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.line_number.cmp(&b.line_number)));
    out.extend(binary);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename(kind: TransactionKind, from: &str, to: &str) -> Transaction {
        Transaction::new_rename(kind, PathBuf::from(from), PathBuf::from(to))
    }

    #[test]
    fn folders_order_deepest_first() {
        let txs = vec![
            rename(TransactionKind::FolderName, "a", "a2"),
            rename(TransactionKind::FolderName, "a/b", "a/b2"),
            rename(TransactionKind::FolderName, "a/b/c", "a/b/c2"),
        ];
        let (ordered, _) = plan(txs, Path::new("/tmp/does-not-exist-root"));
        let paths: Vec<_> = ordered.iter().map(|t| t.path.to_string_lossy().into_owned()).collect();
        assert_eq!(paths, vec!["a/b/c", "a/b", "a"]);
    }

    #[test]
    fn detects_case_insensitive_collision_between_two_renames() {
        let txs = vec![
            rename(TransactionKind::FileName, "Readme.md", "README.md"),
            rename(TransactionKind::FileName, "readme.md", "README.md"),
        ];
        let (ordered, collisions) = plan(txs, Path::new("/tmp/does-not-exist-root"));
        assert_eq!(collisions.len(), 1);
        let statuses: Vec<_> = ordered.iter().map(|t| t.status).collect();
        assert!(statuses.contains(&TransactionStatus::Completed) || statuses.iter().any(|s| *s == TransactionStatus::Pending));
        assert!(statuses.contains(&TransactionStatus::Skipped));
    }

    #[test]
    fn breaks_a_two_rename_cycle_via_temp_name() {
        let txs = vec![
            rename(TransactionKind::FileName, "A", "B"),
            rename(TransactionKind::FileName, "B", "A"),
        ];
        let (ordered, collisions) = plan(txs, Path::new("/tmp/does-not-exist-root"));
        assert!(collisions.is_empty());
        assert_eq!(ordered.len(), 3);
        assert!(ordered[0].new_path.as_ref().unwrap().to_string_lossy().contains("refold-tmp"));
        assert_eq!(ordered[2].new_path.as_ref().unwrap(), &PathBuf::from("B"));
    }

    #[test]
    fn cycle_break_stays_atomic_when_the_walk_order_sorts_against_it() {
        // "zebra.txt" sorts after "apple.txt", so a naive lexicographic
        // sort of the three post-break transactions would interleave them
        // as [apple->zebra, tmp->apple, zebra->tmp] and fail at execution.
        // The walk can surface these two renames in either order, so the
        // fix must hold regardless of which one is detected first.
        let txs = vec![
            rename(TransactionKind::FileName, "zebra.txt", "apple.txt"),
            rename(TransactionKind::FileName, "apple.txt", "zebra.txt"),
        ];
        let (ordered, collisions) = plan(txs, Path::new("/tmp/does-not-exist-root"));
        assert!(collisions.is_empty());
        assert_eq!(ordered.len(), 3);

        assert_eq!(ordered[0].path, PathBuf::from("zebra.txt"));
        let tmp_path = ordered[0].new_path.as_ref().unwrap().clone();
        assert!(tmp_path.to_string_lossy().contains("refold-tmp"));

        assert_eq!(ordered[1].path, PathBuf::from("apple.txt"));
        assert_eq!(ordered[1].new_path.as_ref().unwrap(), &PathBuf::from("zebra.txt"));

        assert_eq!(&ordered[2].path, &tmp_path);
        assert_eq!(ordered[2].new_path.as_ref().unwrap(), &PathBuf::from("apple.txt"));
    }

    #[test]
    fn content_precedes_own_file_rename() {
        let content = Transaction::new_content_line(
            PathBuf::from("a.txt"),
            1,
            b"hello\n".to_vec(),
            b"HI\n".to_vec(),
            "UTF-8".to_string(),
            crate::model::NewlineStyle::Lf,
        );
        let rename_tx = rename(TransactionKind::FileName, "a.txt", "b.txt");
        let (ordered, _) = plan(vec![rename_tx, content], Path::new("/tmp/does-not-exist-root"));
        assert_eq!(ordered[0].kind, TransactionKind::FileContentLine);
        assert_eq!(ordered[1].kind, TransactionKind::FileName);
    }
}
