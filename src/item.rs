//! 1Password item records and account selection.
//!
//! The item shape is defined by the `op` CLI's JSON output; only the parts
//! this tool reads are modeled, everything else is ignored on deserialize.
//! Section fields use 1Password's terse `k`/`n`/`t`/`v` keys, where `t` is
//! the field title and `v` the value.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub overview: Overview,
    #[serde(default)]
    pub details: Details,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Overview {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Details {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<SectionField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionField {
    #[serde(default)]
    pub k: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub t: String,
    #[serde(default)]
    pub v: String,
}

impl Item {
    /// Extracts the account alias from the section whose title matches
    /// `section_name`, reading the field whose title matches `field_title`.
    /// A later match overwrites an earlier one.
    pub fn account_alias(&self, section_name: &str, field_title: &str) -> Option<String> {
        let mut alias = None;
        for section in &self.details.sections {
            if section.title != section_name {
                continue;
            }
            for field in &section.fields {
                if field.t == field_title {
                    alias = Some(field.v.clone());
                }
            }
        }
        alias
    }
}

/// Keeps the items whose title contains at least one of the filter terms
/// (case-sensitive substring, logical OR), then sorts by title so repeated
/// runs enumerate accounts in the same order. With no filters every item is
/// kept.
pub fn filter_items(items: Vec<Item>, filters: &[String]) -> Vec<Item> {
    let mut kept = if filters.is_empty() {
        items
    } else {
        items
            .into_iter()
            .filter(|item| filters.iter().any(|f| item.overview.title.contains(f)))
            .collect()
    };
    kept.sort_by(|a, b| a.overview.title.cmp(&b.overview.title));
    kept
}

/// Picks one item: a single candidate is auto-selected, several are
/// enumerated on `output` and chosen by number read from `input`, none is an
/// error naming the filters.
///
/// Out-of-range or non-numeric input fails with a generic parse/index error.
pub fn choose<'a, R, W>(items: &'a [Item], filters: &[String], mut input: R, mut output: W) -> Result<&'a Item>
where
    R: BufRead,
    W: Write,
{
    match items {
        [] => bail!("No entries were found using filters {filters:?}"),
        [only] => Ok(only),
        _ => {
            for (num, item) in items.iter().enumerate() {
                writeln!(output, "{num} {}", item.overview.title)?;
            }
            write!(output, "\nChoose the account number: ")?;
            output.flush()?;

            let mut choice = String::new();
            input.read_line(&mut choice)?;
            let num = choice
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid choice {:?}", choice.trim()))?;
            let item = items.get(num).with_context(|| format!("Invalid choice {num}"))?;
            writeln!(output, "\nChosen account: {}\n", item.overview.title)?;
            Ok(item)
        }
    }
}
