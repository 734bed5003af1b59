//! Tree encoding and directory structure.
//!
//! A tree is serialized as one line per entry, `type\tdigest\tname\n`,
//! in the order the entries were given.

use crate::error::{Error, Result};
use crate::hash::{HASH_HEX_LEN, Hash};
use std::collections::HashSet;
use std::fmt;
use std::path::MAIN_SEPARATOR;

/// Entry type in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// A blob (file).
    Blob,
    /// A subtree (directory).
    Tree,
}

impl EntryType {
    /// Name used in the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Blob => "blob",
            EntryType::Tree => "tree",
        }
    }

    /// Parse from the serialized name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(EntryType::Blob),
            "tree" => Some(EntryType::Tree),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in a tree (file or subdirectory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Type of entry (blob or tree).
    pub entry_type: EntryType,
    /// Hash of the object.
    pub hash: Hash,
    /// Name of the entry (UTF-8).
    pub name: String,
}

impl TreeEntry {
    /// Create a new tree entry.
    ///
    /// The name must pass [`TreeEntry::validate_name`].
    pub fn new(entry_type: EntryType, hash: Hash, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;

        Ok(Self {
            entry_type,
            hash,
            name,
        })
    }

    /// Check that a name is a single path component that survives the
    /// line-and-tab serialization.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_input("Tree entry name cannot be empty"));
        }

        if name == "." || name == ".." {
            return Err(Error::invalid_input(format!(
                "Tree entry name cannot be {}",
                name
            )));
        }

        if name
            .chars()
            .any(|c| c == '/' || c == MAIN_SEPARATOR || matches!(c, '\t' | '\n' | '\r' | '\0'))
        {
            return Err(Error::invalid_input(format!(
                "Tree entry name contains a separator or control character: {:?}",
                name
            )));
        }

        Ok(())
    }
}

/// An ordered snapshot of one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree, keeping the given order.
    pub fn new(entries: Vec<TreeEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(Error::corrupt(
                    "tree",
                    format!("duplicate entry name: {}", entry.name),
                ));
            }
        }
        Ok(Self { entries })
    }

    /// The entries, in order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Canonical text form.
    pub fn serialize(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(entry.entry_type.as_str());
            text.push('\t');
            text.push_str(&entry.hash.to_hex());
            text.push('\t');
            text.push_str(&entry.name);
            text.push('\n');
        }
        text
    }

    /// Parse the canonical text form. Blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (index, line) in text.split('\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_no = index + 1;

            let fields: Vec<&str> = line.split('\t').collect();
            let [type_str, digest, name] = fields[..] else {
                return Err(Error::malformed_entry(
                    line_no,
                    format!("expected 3 tab-separated fields, got {}", fields.len()),
                ));
            };

            let entry_type = EntryType::parse(type_str).ok_or_else(|| {
                Error::malformed_entry(line_no, format!("unknown entry type: {:?}", type_str))
            })?;

            if digest.len() != HASH_HEX_LEN {
                return Err(Error::malformed_entry(
                    line_no,
                    format!(
                        "digest must be {} characters, got {}",
                        HASH_HEX_LEN,
                        digest.len()
                    ),
                ));
            }
            let hash = Hash::from_hex(digest)
                .map_err(|e| Error::malformed_entry(line_no, e.to_string()))?;

            let entry = TreeEntry::new(entry_type, hash, name)
                .map_err(|e| Error::corrupt(format!("tree line {}", line_no), e.to_string()))?;
            entries.push(entry);
        }

        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn blob(name: &str, content: &str) -> TreeEntry {
        TreeEntry::new(EntryType::Blob, Hash::digest(content), name).unwrap()
    }

    #[test]
    fn test_serialize_format() {
        let tree = Tree::new(vec![
            blob("hello.txt", "hello"),
            TreeEntry::new(EntryType::Tree, Hash::digest(""), "sub").unwrap(),
        ])
        .unwrap();

        assert_eq!(
            tree.serialize(),
            format!(
                "blob\t{}\thello.txt\ntree\tda39a3ee5e6b4b0d3255bfef95601890afd80709\tsub\n",
                HELLO
            )
        );
    }

    #[test]
    fn test_empty_tree() {
        let tree = Tree::new(vec![]).unwrap();
        assert_eq!(tree.serialize(), "");
        assert_eq!(Tree::parse("").unwrap(), tree);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_parse_keeps_order() {
        let tree = Tree::new(vec![blob("z", "1"), blob("a", "2")]).unwrap();
        let parsed = Tree::parse(&tree.serialize()).unwrap();

        assert_eq!(parsed.entries()[0].name, "z");
        assert_eq!(parsed.entries()[1].name, "a");
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let text = format!("\nblob\t{}\ta\n\n", HELLO);
        let tree = Tree::parse(&text).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("a").unwrap().hash.to_hex(), HELLO);
    }

    #[test]
    fn test_parse_name_with_spaces() {
        let text = format!("blob\t{}\tmy file.txt\n", HELLO);
        let tree = Tree::parse(&text).unwrap();
        assert_eq!(tree.entries()[0].name, "my file.txt");
    }

    #[test]
    fn test_parse_wrong_field_count() {
        let two = format!("blob\t{}\n", HELLO);
        let four = format!("blob\t{}\ta\textra\n", HELLO);

        assert!(matches!(
            Tree::parse(&two),
            Err(Error::MalformedEntry { line: 1, .. })
        ));
        assert!(matches!(
            Tree::parse(&four),
            Err(Error::MalformedEntry { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_bad_type() {
        let text = format!("blob\t{}\ta\ncommit\t{}\tb\n", HELLO, HELLO);
        assert!(matches!(
            Tree::parse(&text),
            Err(Error::MalformedEntry { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_bad_digest() {
        assert!(matches!(
            Tree::parse("blob\taaf4\ta\n"),
            Err(Error::MalformedEntry { .. })
        ));
        let not_hex = format!("blob\t{}\ta\n", "g".repeat(40));
        assert!(matches!(
            Tree::parse(&not_hex),
            Err(Error::MalformedEntry { .. })
        ));
    }

    #[test]
    fn test_parse_uppercase_digest_normalizes() {
        let text = format!("blob\t{}\ta\n", HELLO.to_ascii_uppercase());
        let tree = Tree::parse(&text).unwrap();
        assert_eq!(tree.serialize(), format!("blob\t{}\ta\n", HELLO));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(matches!(
            Tree::new(vec![blob("a", "1"), blob("a", "2")]),
            Err(Error::Corrupt { .. })
        ));

        let text = format!("blob\t{}\ta\ntree\t{}\ta\n", HELLO, HELLO);
        assert!(matches!(Tree::parse(&text), Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_entry_name_validation() {
        let hash = Hash::digest("test");

        assert!(TreeEntry::new(EntryType::Blob, hash, "").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, "a/b").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, "a\tb").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, "a\nb").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, "..").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, "a\rb").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, "a\0b").is_err());
        assert!(TreeEntry::new(EntryType::Blob, hash, ".hidden").is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_backslash_is_a_plain_character_on_unix() {
        let entry = TreeEntry::new(EntryType::Blob, Hash::digest("x"), "weird\\name.txt").unwrap();
        let tree = Tree::new(vec![entry]).unwrap();

        let parsed = Tree::parse(&tree.serialize()).unwrap();
        assert_eq!(parsed.entries()[0].name, "weird\\name.txt");
    }

    #[test]
    #[cfg(windows)]
    fn test_backslash_is_a_separator_on_windows() {
        assert!(TreeEntry::new(EntryType::Blob, Hash::digest("x"), "a\\b").is_err());
    }

    #[test]
    fn test_entry_type_names() {
        assert_eq!(EntryType::parse("blob"), Some(EntryType::Blob));
        assert_eq!(EntryType::parse("tree"), Some(EntryType::Tree));
        assert_eq!(EntryType::parse("Blob"), None);
        assert_eq!(EntryType::Tree.to_string(), "tree");
    }

    // Property-based tests
    use proptest::prelude::*;

    fn arb_entry_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ._-]{1,64}".prop_filter("not . or ..", |s| s != "." && s != "..")
    }

    fn arb_tree() -> impl Strategy<Value = Tree> {
        prop::collection::btree_map(
            arb_entry_name(),
            (
                prop::sample::select(vec![EntryType::Blob, EntryType::Tree]),
                prop::array::uniform20(any::<u8>()),
            ),
            0..20,
        )
        .prop_map(|entries| {
            let entries = entries
                .into_iter()
                .map(|(name, (entry_type, bytes))| {
                    TreeEntry::new(entry_type, Hash::from_bytes(bytes), name).unwrap()
                })
                .collect();
            Tree::new(entries).unwrap()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// parse(serialize(t)) == t
        #[test]
        fn prop_tree_roundtrip(tree in arb_tree()) {
            let parsed = Tree::parse(&tree.serialize())?;
            prop_assert_eq!(parsed, tree);
        }

        /// Every serialized line has exactly three fields
        #[test]
        fn prop_serialized_lines_have_three_fields(tree in arb_tree()) {
            let text = tree.serialize();
            prop_assert_eq!(text.lines().count(), tree.len());
            for line in text.lines() {
                prop_assert_eq!(line.split('\t').count(), 3);
            }
        }
    }
}
