//! Terminal rendering of query results
//!
//! Each hit shows its rank, id and score, the highlighted fragments of every
//! matched field, and the position and byte span of each matched term.
//! Colour goes to the header lines only; `colored` turns itself off when
//! output is not a terminal or `NO_COLOR` is set.

use anyhow::Result;
use colored::*;
use std::io::Write;

use crate::indexer::{Hit, ResultSet};

const RULE_WIDTH: usize = 50;

/// Handles formatting and printing search results
pub struct ResultPrinter {
    json: bool,
}

impl ResultPrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Render `results` for the query `query` to `out`
    pub fn print_results<W: Write>(&self, out: &mut W, query: &str, results: &ResultSet) -> Result<()> {
        if self.json {
            serde_json::to_writer_pretty(&mut *out, results)?;
            writeln!(out)?;
            return Ok(());
        }

        writeln!(out)?;
        if results.total_hits == 0 {
            writeln!(out, "{} '{}'", "No results for".yellow(), query)?;
            return Ok(());
        }

        writeln!(
            out,
            "{} {}",
            format!("{} matches", results.total_hits).green().bold(),
            format!("for '{}', showing {}:", query, results.hits.len()).green()
        )?;
        writeln!(out)?;

        for (i, hit) in results.hits.iter().enumerate() {
            self.print_hit(out, i + 1, hit)?;
        }

        Ok(())
    }

    fn print_hit<W: Write>(&self, out: &mut W, rank: usize, hit: &Hit) -> Result<()> {
        writeln!(
            out,
            "{} | id = '{}' score = '{}'",
            format!("{:>4}", rank).cyan().bold(),
            hit.id.blue().bold(),
            format!("{:.6}", hit.score)
        )?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH).dimmed())?;

        for (field, fragments) in &hit.fragments {
            writeln!(
                out,
                "  Fragment field='{}' val='{}'",
                field,
                collapse_newlines(&fragments.join(" "))
            )?;
        }

        for (field, terms) in &hit.locations {
            writeln!(out, "  Location - {}", field)?;
            for (term, locations) in terms {
                writeln!(out, "    - Term: {}", term)?;
                for loc in locations {
                    writeln!(
                        out,
                        "      - Positions: pos={} start={} end={}",
                        loc.pos, loc.start, loc.end
                    )?;
                }
            }
        }

        writeln!(out)?;
        Ok(())
    }
}

/// Replace every line break with a single space
fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::TermLocation;
    use std::collections::BTreeMap;

    fn sample_results() -> ResultSet {
        let mut terms = BTreeMap::new();
        terms.insert(
            "fox".to_string(),
            vec![TermLocation {
                pos: 3,
                start: 10,
                end: 13,
            }],
        );

        let mut hit = Hit {
            id: "a.txt".to_string(),
            score: 0.5,
            fragments: BTreeMap::new(),
            locations: BTreeMap::new(),
        };
        hit.fragments.insert(
            "contents".to_string(),
            vec!["the quick\n<b>fox</b>\r\njumps".to_string()],
        );
        hit.locations.insert("contents".to_string(), terms);

        ResultSet {
            total_hits: 1,
            hits: vec![hit],
        }
    }

    fn render(printer: &ResultPrinter, results: &ResultSet) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        printer.print_results(&mut out, "fox", results).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_renders_hit_fragments_and_positions() {
        let text = render(&ResultPrinter::new(false), &sample_results());

        assert!(text.contains("1 matches for 'fox', showing 1:"));
        assert!(text.contains("   1 | id = 'a.txt' score = '0.500000'"));
        assert!(text.contains("  Fragment field='contents' val='the quick <b>fox</b> jumps'"));
        assert!(text.contains("  Location - contents\n    - Term: fox\n"));
        assert!(text.contains("      - Positions: pos=3 start=10 end=13"));
    }

    #[test]
    fn test_renders_empty_result_set() {
        let text = render(&ResultPrinter::new(false), &ResultSet::default());
        assert!(text.contains("No results for 'fox'"));
    }

    #[test]
    fn test_count_only_results_report_matches() {
        let results = ResultSet {
            total_hits: 5,
            hits: Vec::new(),
        };
        let text = render(&ResultPrinter::new(false), &results);

        assert!(text.contains("5 matches for 'fox', showing 0:"));
        assert!(!text.contains("No results"));
    }

    #[test]
    fn test_json_output_round_trips() {
        let results = sample_results();
        let text = render(&ResultPrinter::new(true), &results);

        let parsed: ResultSet = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, results);
    }

    #[test]
    fn test_collapse_newlines() {
        assert_eq!(collapse_newlines("a\nb\r\nc"), "a b c");
        assert_eq!(collapse_newlines("a\n\nb"), "a  b");
    }
}
