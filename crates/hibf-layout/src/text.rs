//! Textual encoding: `@`-prefixed metadata (ignored on read, not
//! round-tripped), `#`-prefixed layout headers, and tab-separated content
//! rows.

use crate::{Layout, MaxBin, UserBin};
use hibf_error::{HibfError, Result};
use hibf_types::UserBinId;

const TOP_LEVEL_HEADER_PREFIX: &str = "#TOP_LEVEL_IBF max_bin_id:";
const LOWER_LEVEL_HEADER_PREFIX: &str = "#LOWER_LEVEL_IBF_";
const FULLEST_TB_MARKER: &str = "fullest_technical_bin_idx:";

/// Serializes `layout` to its textual form: one `#TOP_LEVEL_IBF` header
/// line, one `#LOWER_LEVEL_IBF_<path>` line per nested IBF, then one
/// tab-separated content row per user bin.
#[must_use]
pub fn write_to_string(layout: &Layout) -> String {
    let mut out = String::new();
    out.push_str(TOP_LEVEL_HEADER_PREFIX);
    out.push_str(&layout.top_level_max_bin_id.to_string());
    out.push('\n');

    for max_bin in &layout.max_bins {
        out.push_str(LOWER_LEVEL_HEADER_PREFIX);
        out.push_str(&join_usize(&max_bin.previous_tb_indices, ';'));
        out.push(' ');
        out.push_str(FULLEST_TB_MARKER);
        out.push_str(&max_bin.id.to_string());
        out.push('\n');
    }

    for user_bin in &layout.user_bins {
        out.push_str(&user_bin.idx.to_string());
        out.push('\t');
        for previous in &user_bin.previous_tb_indices {
            out.push_str(&previous.to_string());
            out.push(';');
        }
        out.push_str(&user_bin.storage_tb_id.to_string());
        out.push('\t');
        for _ in &user_bin.previous_tb_indices {
            out.push_str("1;");
        }
        out.push_str(&user_bin.number_of_technical_bins.to_string());
        out.push('\n');
    }

    out
}

fn join_usize(values: &[usize], sep: char) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

fn parse_path(path: &str) -> Result<Vec<usize>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split(';')
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| HibfError::serialization(format!("invalid path index {s:?}: {e}")))
        })
        .collect()
}

/// Parses a layout written by [`write_to_string`]. `@`-prefixed metadata
/// lines are skipped, not round-tripped.
pub fn parse(text: &str) -> Result<Layout> {
    let mut lines = text.lines().filter(|l| !l.is_empty() && !l.starts_with('@'));

    let first = lines
        .next()
        .ok_or_else(|| HibfError::serialization("empty layout stream"))?;
    let top_level_max_bin_id = first
        .strip_prefix(TOP_LEVEL_HEADER_PREFIX)
        .ok_or_else(|| {
            HibfError::serialization(format!("expected {TOP_LEVEL_HEADER_PREFIX:?} header, got {first:?}"))
        })?
        .parse::<usize>()
        .map_err(|e| HibfError::serialization(format!("invalid top-level max bin id: {e}")))?;

    let mut max_bins = Vec::new();
    let mut user_bins = Vec::new();

    for line in lines {
        if let Some(rest) = line.strip_prefix(LOWER_LEVEL_HEADER_PREFIX) {
            let (path, marker_and_id) = rest
                .split_once(' ')
                .ok_or_else(|| HibfError::serialization(format!("malformed lower-level header: {line:?}")))?;
            let id_str = marker_and_id.strip_prefix(FULLEST_TB_MARKER).ok_or_else(|| {
                HibfError::serialization(format!("expected {FULLEST_TB_MARKER:?} marker in {line:?}"))
            })?;
            let id = id_str
                .parse::<usize>()
                .map_err(|e| HibfError::serialization(format!("invalid fullest technical bin id: {e}")))?;
            max_bins.push(MaxBin {
                previous_tb_indices: parse_path(path)?,
                id,
            });
        } else if line.starts_with('#') {
            // Tolerate unknown header lines (e.g. #USER_BIN_IDX column-name
            // comments) without erroring.
            continue;
        } else {
            let mut fields = line.split('\t');
            let idx_field = fields
                .next()
                .ok_or_else(|| HibfError::serialization(format!("missing user bin index in {line:?}")))?;
            let tb_indices_field = fields
                .next()
                .ok_or_else(|| HibfError::serialization(format!("missing TB indices in {line:?}")))?;
            let ntb_field = fields
                .next()
                .ok_or_else(|| HibfError::serialization(format!("missing bin count in {line:?}")))?;

            let idx = idx_field
                .parse::<u32>()
                .map_err(|e| HibfError::serialization(format!("invalid user bin index: {e}")))?;

            let mut tb_path = parse_path(tb_indices_field)?;
            let storage_tb_id = tb_path
                .pop()
                .ok_or_else(|| HibfError::serialization(format!("empty TB indices in {line:?}")))?;

            let mut ntb_path = parse_path(ntb_field)?;
            let number_of_technical_bins = ntb_path
                .pop()
                .ok_or_else(|| HibfError::serialization(format!("empty bin count in {line:?}")))?;

            user_bins.push(UserBin {
                previous_tb_indices: tb_path,
                storage_tb_id,
                number_of_technical_bins,
                idx: UserBinId::new(idx),
            });
        }
    }

    Ok(Layout {
        top_level_max_bin_id,
        max_bins,
        user_bins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layout() -> Layout {
        Layout {
            top_level_max_bin_id: 4,
            max_bins: vec![
                MaxBin {
                    previous_tb_indices: vec![],
                    id: 2,
                },
                MaxBin {
                    previous_tb_indices: vec![2, 5],
                    id: 7,
                },
            ],
            user_bins: vec![
                UserBin {
                    previous_tb_indices: vec![],
                    storage_tb_id: 0,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(0),
                },
                UserBin {
                    previous_tb_indices: vec![2],
                    storage_tb_id: 9,
                    number_of_technical_bins: 3,
                    idx: UserBinId::new(1),
                },
            ],
        }
    }

    #[test]
    fn round_trips_through_text() {
        let layout = sample_layout();
        let text = write_to_string(&layout);
        let parsed = parse(&text).expect("valid layout text");
        assert_eq!(layout, parsed);
    }

    #[test]
    fn content_row_matches_grammar() {
        let layout = sample_layout();
        let text = write_to_string(&layout);
        assert!(text.contains("1\t2;9\t1;3"));
        assert!(text.contains("0\t0\t1"));
    }

    #[test]
    fn rejects_truncated_stream() {
        assert!(parse("").is_err());
        assert!(parse("#TOP_LEVEL_IBF max_bin_id:3\n0\t0").is_err());
    }

    #[test]
    fn skips_metadata_lines() {
        let layout = sample_layout();
        let mut text = String::from("@HIBF_CONFIG\n@0 k = 2\n@HIBF_CONFIG_END\n");
        text.push_str(&write_to_string(&layout));
        let parsed = parse(&text).expect("valid layout text");
        assert_eq!(layout, parsed);
    }
}
