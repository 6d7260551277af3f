/*
 * SPDX-FileCopyrightText: 2026 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Reading weighted adjacency matrices from lists of arcs.

use crate::ArcsArgs;
use anyhow::{Context, Result, ensure};
use dsi_progress_logger::prelude::*;
use sprank::prelude::*;
use std::collections::HashMap;
use std::io::BufRead;

/// Reads a list of arcs and returns the weighted adjacency matrix of the
/// graph they describe.
///
/// Each line contains a source, a target and optionally a weight, in the
/// columns and with the separator specified by `args`. An arc from *s* to *t*
/// with weight *w* adds *w* to the entry in row *t* and column *s*, so
/// repeated arcs accumulate. Arcs without a weight have weight 1.
///
/// If `args.exact` is false, sources and targets are labels, and nodes are
/// numbered in order of first appearance; the labels are returned, indexed by
/// node. Otherwise, they are parsed as node indices.
///
/// Comment lines are ignored, and malformed lines are skipped with a warning.
/// With node indices, lines containing an index that is not smaller than
/// `num_nodes` (or equal to `usize::MAX` if `num_nodes` is `None`) are
/// malformed.
///
/// `num_nodes`, if specified, is used instead of the number of nodes inferred
/// from the arcs. It can be used to add isolated nodes at the end of the
/// graph, but it cannot be smaller than the number of labels.
pub fn read_arcs(
    args: &ArcsArgs,
    num_nodes: Option<usize>,
    reader: impl BufRead,
    pl: &mut impl ProgressLog,
) -> Result<(SparseMatrix, Option<Vec<String>>)> {
    let mut nodes: HashMap<String, usize> = HashMap::new();
    let mut labels = Vec::new();
    let mut arcs = Vec::new();

    pl.item_name("arc");
    pl.start("Reading arcs...");

    let min_columns = args
        .weight_column
        .unwrap_or(0)
        .max(args.source_column)
        .max(args.target_column)
        + 1;
    let mut inferred_num_nodes = 0;
    let mut skipped = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line_num = line_num + 1;
        let line = line.with_context(|| format!("Could not read line {}", line_num))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(args.line_comment_symbol) {
            continue;
        }

        let vals = line.split(args.separator).collect::<Vec<_>>();

        if vals.len() <= args.source_column.max(args.target_column) {
            log::warn!(
                "Line {}: {:?} has {} column(s) separated by {:?}, expected {} (see --separator)",
                line_num,
                line,
                vals.len(),
                args.separator,
                min_columns,
            );
            skipped += 1;
            continue;
        }

        let src = vals[args.source_column].trim();
        let dst = vals[args.target_column].trim();

        let weight = match args.weight_column.and_then(|col| vals.get(col)) {
            None => 1.0,
            Some(w) => match w.trim().parse::<f64>() {
                Ok(w) if w.is_finite() && w >= 0.0 => w,
                Ok(w) => {
                    log::warn!("Line {}: invalid weight {}", line_num, w);
                    skipped += 1;
                    continue;
                }
                Err(err) => {
                    log::warn!(
                        "Line {}: error parsing weight {:?}: {}",
                        line_num,
                        w,
                        err
                    );
                    skipped += 1;
                    continue;
                }
            },
        };

        // parse if exact, or build a node list
        let (src_id, dst_id) = if args.exact {
            let (src_id, dst_id) = match (src.parse::<usize>(), dst.parse::<usize>()) {
                (Ok(src_id), Ok(dst_id)) => (src_id, dst_id),
                (Err(err), _) | (_, Err(err)) => {
                    log::warn!(
                        "Line {}: error parsing node indices {:?} and {:?}: {}",
                        line_num,
                        src,
                        dst,
                        err
                    );
                    skipped += 1;
                    continue;
                }
            };
            // the largest index must leave room for the number of nodes
            let limit = num_nodes.unwrap_or(usize::MAX);
            if src_id >= limit || dst_id >= limit {
                log::warn!(
                    "Line {}: node index {} is out of range (must be less than {})",
                    line_num,
                    src_id.max(dst_id),
                    limit
                );
                skipped += 1;
                continue;
            }
            (src_id, dst_id)
        } else {
            let mut node_id = |label: &str| {
                let next_id = nodes.len();
                *nodes.entry(label.to_owned()).or_insert_with(|| {
                    labels.push(label.to_owned());
                    next_id
                })
            };
            (node_id(src), node_id(dst))
        };

        inferred_num_nodes = inferred_num_nodes.max(src_id.max(dst_id) + 1);
        arcs.push((dst_id, src_id, weight));
        pl.light_update();
    }
    pl.done();

    if !args.exact {
        debug_assert_eq!(inferred_num_nodes, labels.len());
    }

    let num_nodes = match num_nodes {
        Some(num_nodes) => {
            ensure!(
                num_nodes >= inferred_num_nodes,
                "The number of nodes specified by --num-nodes={} is smaller than the number of labels found in the arcs: {}",
                num_nodes,
                inferred_num_nodes
            );
            num_nodes
        }
        None => inferred_num_nodes,
    };

    log::info!(
        "Arcs read: {} Nodes: {} Skipped lines: {}",
        arcs.len(),
        num_nodes,
        skipped
    );
    if arcs.is_empty() {
        log::warn!(
            "No arcs read! Check that the --separator={:?} value is correct and that the --source-column={:?} and --target-column={:?} values are correct.",
            args.separator,
            args.source_column,
            args.target_column
        );
    }

    let matrix = SparseMatrix::from_triplets(num_nodes, num_nodes, arcs)?;
    Ok((matrix, (!args.exact).then_some(labels)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_progress_logger::no_logging;

    fn args() -> ArcsArgs {
        ArcsArgs {
            line_comment_symbol: '#',
            separator: '\t',
            source_column: 0,
            target_column: 1,
            weight_column: None,
            exact: false,
        }
    }

    #[test]
    fn test_labels() -> Result<()> {
        let input = "# a comment\nb\ta\na\tc\nb\tc\nb\ta\n";
        let (m, labels) = read_arcs(&args(), None, input.as_bytes(), no_logging![])?;
        assert_eq!(
            labels,
            Some(vec!["b".to_owned(), "a".to_owned(), "c".to_owned()])
        );
        assert_eq!(m.num_rows(), 3);
        // b → a twice
        assert_eq!(m.get(1, 0), 2.0);
        assert_eq!(m.get(2, 1), 1.0);
        assert_eq!(m.get(2, 0), 1.0);
        assert_eq!(m.num_entries(), 3);
        Ok(())
    }

    #[test]
    fn test_exact_weighted() -> Result<()> {
        let mut args = args();
        args.exact = true;
        args.separator = ',';
        args.weight_column = Some(2);
        let input = "0,2,0.5\n2,1\n1,0,3\n";
        let (m, labels) = read_arcs(&args, Some(4), input.as_bytes(), no_logging![])?;
        assert!(labels.is_none());
        assert_eq!(m.num_rows(), 4);
        assert_eq!(m.get(2, 0), 0.5);
        assert_eq!(m.get(1, 2), 1.0);
        assert_eq!(m.get(0, 1), 3.0);
        assert_eq!(m.column_occupancy(), vec![true, true, true, false]);
        Ok(())
    }

    #[test]
    fn test_malformed_lines() -> Result<()> {
        let mut args = args();
        args.exact = true;
        args.weight_column = Some(2);
        let input = "0\t1\n0\n1\tx\n0\t1\tfoo\n0\t1\t-1\n1\t0\t2\n";
        let (m, _) = read_arcs(&args, None, input.as_bytes(), no_logging![])?;
        assert_eq!(m.num_entries(), 2);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(0, 1), 2.0);
        Ok(())
    }

    #[test]
    fn test_out_of_range_indices() -> Result<()> {
        let mut args = args();
        args.exact = true;
        let input = "0\t5\n0\t1\n2\t0\n";
        let (m, _) = read_arcs(&args, Some(3), input.as_bytes(), no_logging![])?;
        assert_eq!(m.num_rows(), 3);
        assert_eq!(m.num_entries(), 2);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(0, 2), 1.0);
        Ok(())
    }

    #[test]
    fn test_largest_index() -> Result<()> {
        let mut args = args();
        args.exact = true;
        let input = format!("0\t{}\n{}\t0\n1\t0\n", usize::MAX, usize::MAX);
        let (m, _) = read_arcs(&args, None, input.as_bytes(), no_logging![])?;
        assert_eq!(m.num_rows(), 2);
        assert_eq!(m.num_entries(), 1);
        assert_eq!(m.get(0, 1), 1.0);
        // An index just below usize::MAX is accepted, but no matrix that
        // large can be allocated
        let input = format!("0\t{}\n", usize::MAX - 1);
        assert!(read_arcs(&args, None, input.as_bytes(), no_logging![]).is_err());
        Ok(())
    }

    #[test]
    fn test_too_few_nodes() {
        let input = "a\tb\nb\tc\n";
        assert!(read_arcs(&args(), Some(2), input.as_bytes(), no_logging![]).is_err());
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        let (m, labels) = read_arcs(&args(), None, "".as_bytes(), no_logging![])?;
        assert_eq!(m.num_rows(), 0);
        assert_eq!(labels, Some(vec![]));
        Ok(())
    }
}
