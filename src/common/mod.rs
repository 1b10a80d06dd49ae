//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss = procfs::process::Process::myself()
        .and_then(|me| me.stat())
        .map(|stat| stat.rss * procfs::page_size());
    match rss {
        Ok(rss) => tracing::debug!(
            "RSS now: {}",
            byte_unit::Byte::from_u64(rss).get_appropriate_unit(byte_unit::UnitType::Binary)
        ),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Definition of canonical chromosome names.
pub const CHROMS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y", "M",
];

/// Multiplier used for encoding the chromosome into `xpos`.
pub const XPOS_CHROM_FACTOR: i64 = 1_000_000_000;

/// Canonicalize chromosome name by stripping the "chr" prefix and mapping "MT" to "M".
pub fn canonicalize(chrom: &str) -> String {
    let chrom = chrom
        .strip_prefix("chr")
        .or_else(|| chrom.strip_prefix("CHR"))
        .unwrap_or(chrom);
    match chrom {
        "MT" | "mt" | "m" => String::from("M"),
        "x" => String::from("X"),
        "y" => String::from("Y"),
        _ => chrom.to_owned(),
    }
}

/// Return whether the chromosome is the X chromosome.
pub fn is_x_chrom(chrom: &str) -> bool {
    canonicalize(chrom) == "X"
}

/// Compute the genome-wide position encoding of chromosome and position.
///
/// Chromosomes are numbered 1..22, X=23, Y=24, M=25.
pub fn get_xpos(chrom: &str, pos: i32) -> Result<i64, anyhow::Error> {
    let canonical = canonicalize(chrom);
    let idx = CHROMS
        .iter()
        .position(|c| *c == canonical)
        .ok_or_else(|| anyhow::anyhow!("unknown chromosome: {}", chrom))?;
    Ok((idx as i64 + 1) * XPOS_CHROM_FACTOR + pos as i64)
}

/// Select the genome release to use.
#[derive(
    clap::ValueEnum,
    Clone,
    Copy,
    Debug,
    strum::Display,
    PartialEq,
    Eq,
    enum_map::Enum,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum GenomeRelease {
    /// GRCh37 / hg19
    #[strum(serialize = "grch37")]
    #[serde(rename = "GRCh37", alias = "37", alias = "grch37")]
    Grch37,
    /// GRCh38 / hg38
    #[strum(serialize = "grch38")]
    #[serde(rename = "GRCh38", alias = "38", alias = "grch38")]
    Grch38,
}

impl GenomeRelease {
    pub fn name(&self) -> String {
        match self {
            GenomeRelease::Grch37 => String::from("GRCh37"),
            GenomeRelease::Grch38 => String::from("GRCh38"),
        }
    }

    /// Return the respective other release, used as liftover target.
    pub fn other(&self) -> Self {
        match self {
            GenomeRelease::Grch37 => GenomeRelease::Grch38,
            GenomeRelease::Grch38 => GenomeRelease::Grch37,
        }
    }
}

impl std::str::FromStr for GenomeRelease {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        if s.starts_with("grch37") || s == "37" {
            Ok(GenomeRelease::Grch37)
        } else if s.starts_with("grch38") || s == "38" {
            Ok(GenomeRelease::Grch38)
        } else {
            Err(anyhow::anyhow!("Unknown genome release: {}", s))
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::GenomeRelease;

    #[test]
    fn trace_rss_now_smoke() {
        super::trace_rss_now();
    }

    #[rstest::rstest]
    #[case("chr1", "1")]
    #[case("1", "1")]
    #[case("chrMT", "M")]
    #[case("MT", "M")]
    #[case("x", "X")]
    #[case("chrX", "X")]
    fn canonicalize(#[case] chrom: &str, #[case] expected: &str) {
        assert_eq!(super::canonicalize(chrom), expected);
    }

    #[rstest::rstest]
    #[case("1", 10_000, 1_000_010_000)]
    #[case("chrX", 1, 23_000_000_001)]
    #[case("MT", 3_000, 25_000_003_000)]
    fn get_xpos(#[case] chrom: &str, #[case] pos: i32, #[case] expected: i64) {
        assert_eq!(super::get_xpos(chrom, pos).unwrap(), expected);
    }

    #[test]
    fn get_xpos_unknown_chrom() {
        assert!(super::get_xpos("chrUn_gl000220", 1).is_err());
    }

    #[rstest::rstest]
    #[case(GenomeRelease::Grch37, "GRCh37")]
    #[case(GenomeRelease::Grch38, "GRCh38")]
    fn genome_release_name(#[case] release: GenomeRelease, #[case] expected: &str) {
        assert_eq!(expected, release.name());
    }

    #[rstest::rstest]
    #[case(GenomeRelease::Grch37, "grch37")]
    #[case(GenomeRelease::Grch38, "GRCh38")]
    #[case(GenomeRelease::Grch38, "38")]
    fn genome_release_from_str(
        #[case] release: GenomeRelease,
        #[case] s: &str,
    ) -> Result<(), anyhow::Error> {
        let res: GenomeRelease = s.parse()?;

        assert_eq!(res, release);

        Ok(())
    }

    #[test]
    fn genome_release_serde() -> Result<(), anyhow::Error> {
        let release: GenomeRelease = serde_json::from_str("\"37\"")?;
        assert_eq!(release, GenomeRelease::Grch37);
        assert_eq!(
            serde_json::to_string(&GenomeRelease::Grch38)?,
            "\"GRCh38\""
        );
        assert_eq!(release.other(), GenomeRelease::Grch38);

        Ok(())
    }
}
