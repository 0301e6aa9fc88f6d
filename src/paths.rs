//! Canonical archive paths.
//!
//! Every artifact lives three hex directories deep: checkpoint files are
//! sharded by the high three bytes of their sequence number, buckets by the
//! first three bytes of their hash. The builders here are the only place
//! paths are constructed, and the parsers are the only place they are taken
//! apart; anything outside the grammar is a foreign artifact and is skipped.

use crate::hash::Hash;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// The single mutable artifact in an archive, always at a fixed location.
pub const ROOT_HAS_PATH: &str = ".well-known/stellar-history.json";

const HEX_PREFIX_PAT: &str = "[0-9a-f]{2}/[0-9a-f]{2}/[0-9a-f]{2}";

/// The artifact kinds stored alongside each checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    History,
    Ledger,
    Transactions,
    Results,
    Scp,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::History,
        Category::Ledger,
        Category::Transactions,
        Category::Results,
        Category::Scp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::History => "history",
            Category::Ledger => "ledger",
            Category::Transactions => "transactions",
            Category::Results => "results",
            Category::Scp => "scp",
        }
    }

    /// History manifests are JSON; everything else is compressed binary.
    pub fn extension(self) -> &'static str {
        match self {
            Category::History => "json",
            _ => "xdr.gz",
        }
    }

    /// `scp` is best-effort: its absence is not a defect.
    pub fn is_required(self) -> bool {
        self != Category::Scp
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A three-level hex directory shard, rendered `aa/bb/cc`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirPrefix([u8; 3]);

impl DirPrefix {
    /// Shard for a checkpoint sequence: its three high bytes.
    pub fn of_checkpoint(seq: u32) -> Self {
        DirPrefix([(seq >> 24) as u8, (seq >> 16) as u8, (seq >> 8) as u8])
    }

    /// Shard for a bucket hash: its first three bytes.
    pub fn of_hash(hash: &Hash) -> Self {
        DirPrefix(hash.prefix_bytes())
    }
}

impl fmt::Display for DirPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}/{:02x}/{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

/// `{cat}/{aa}/{bb}/{cc}/{cat}-{seq:08x}.{ext}`
pub fn category_checkpoint_path(cat: Category, seq: u32) -> String {
    format!(
        "{cat}/{prefix}/{cat}-{seq:08x}.{ext}",
        cat = cat.as_str(),
        prefix = DirPrefix::of_checkpoint(seq),
        ext = cat.extension(),
    )
}

/// `bucket/{aa}/{bb}/{cc}/bucket-{64 hex}.xdr.gz`
pub fn bucket_path(hash: &Hash) -> String {
    format!(
        "bucket/{prefix}/bucket-{hash}.xdr.gz",
        prefix = DirPrefix::of_hash(hash),
    )
}

fn checkpoint_pattern(cat: Category) -> &'static Regex {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        Category::ALL
            .iter()
            .map(|cat| {
                Regex::new(&format!(
                    "^{cat}/{HEX_PREFIX_PAT}/{cat}-([0-9a-f]{{8}})\\.{ext}$",
                    cat = cat.as_str(),
                    ext = regex::escape(cat.extension()),
                ))
                .expect("checkpoint path pattern")
            })
            .collect()
    });
    &patterns[cat as usize]
}

fn bucket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            "^bucket/{HEX_PREFIX_PAT}/bucket-([0-9a-f]{{64}})\\.xdr\\.gz$"
        ))
        .expect("bucket path pattern")
    })
}

/// Recover the checkpoint sequence from a listed path, or `None` when the
/// path does not belong to the category's grammar.
pub fn parse_checkpoint_path(cat: Category, path: &str) -> Option<u32> {
    let captures = checkpoint_pattern(cat).captures(path)?;
    u32::from_str_radix(&captures[1], 16).ok()
}

/// Recover the bucket hash from a listed path, or `None` for foreign paths.
pub fn parse_bucket_path(path: &str) -> Option<Hash> {
    let captures = bucket_pattern().captures(path)?;
    captures[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_path_layout() {
        assert_eq!(
            category_checkpoint_path(Category::Ledger, 0x3f),
            "ledger/00/00/00/ledger-0000003f.xdr.gz"
        );
        assert_eq!(
            category_checkpoint_path(Category::History, 0x7f),
            "history/00/00/00/history-0000007f.json"
        );
        assert_eq!(
            category_checkpoint_path(Category::Scp, 0x123456bf),
            "scp/12/34/56/scp-123456bf.xdr.gz"
        );
    }

    #[test]
    fn checkpoint_path_round_trip() {
        for cat in Category::ALL {
            for seq in [0x3f, 0x7f, 0xffff_ffbf, 0x00ff_ffff] {
                let path = category_checkpoint_path(cat, seq);
                assert_eq!(parse_checkpoint_path(cat, &path), Some(seq), "{path}");
            }
        }
    }

    #[test]
    fn bucket_path_round_trip() {
        let hash: Hash = "e113f8cc5468579cb57538e3204c8d3ecce59a0cdb47f6fa7e87ab4d9d8146fd"
            .parse()
            .expect("valid hash");
        let path = bucket_path(&hash);
        assert_eq!(
            path,
            "bucket/e1/13/f8/bucket-e113f8cc5468579cb57538e3204c8d3ecce59a0cdb47f6fa7e87ab4d9d8146fd.xdr.gz"
        );
        assert_eq!(parse_bucket_path(&path), Some(hash));
    }

    #[test]
    fn parsers_reject_foreign_paths() {
        assert_eq!(parse_checkpoint_path(Category::Ledger, ""), None);
        assert_eq!(
            parse_checkpoint_path(Category::Ledger, "ledger/00/00/00/ledger-zzzz003f.xdr.gz"),
            None
        );
        // Wrong category for the grammar.
        assert_eq!(
            parse_checkpoint_path(Category::History, "ledger/00/00/00/ledger-0000003f.xdr.gz"),
            None
        );
        // Uncompressed extension on a compressed category.
        assert_eq!(
            parse_checkpoint_path(Category::Ledger, "ledger/00/00/00/ledger-0000003f.xdr"),
            None
        );
        // Trailing garbage must not match; the pattern is anchored.
        assert_eq!(
            parse_checkpoint_path(
                Category::Ledger,
                "ledger/00/00/00/ledger-0000003f.xdr.gz.dirty"
            ),
            None
        );
        assert_eq!(parse_bucket_path("bucket/e1/13/f8/bucket-short.xdr.gz"), None);
        assert_eq!(parse_bucket_path("bucket/README.md"), None);
    }

    #[test]
    fn dir_prefix_rendering() {
        assert_eq!(DirPrefix::of_checkpoint(0x0102033f).to_string(), "01/02/03");
        assert_eq!(DirPrefix::of_checkpoint(0x3f).to_string(), "00/00/00");
    }

    #[test]
    fn scp_is_the_only_optional_category() {
        let optional: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|cat| !cat.is_required())
            .collect();
        assert_eq!(optional, vec![Category::Scp]);
    }
}
