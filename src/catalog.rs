//! Puzzle Catalog
//!
//! The fixed, ordered pool of puzzles a portal serves. A catalog is built once
//! (from the built-in set or a TOML file) and shared read-only by every
//! session.
//!
//! Catalog file format:
//! ```toml
//! [[puzzles]]
//! id = "q1"
//! title = "The Cryptographer's Dilemma"
//! description = "..."
//! correct_flag = "CG{...}"
//! hints = ["...", "..."]
//!
//! [puzzles.artifact]
//! file_name = "cipher_collection.txt"
//! path = "challenges/q1/cipher_collection.txt"   # or: inline = "<base64>"
//! ```

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::progress::CompletedSet;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog has no puzzles")]
    Empty,
    #[error("Puzzle at position {0} has an empty id")]
    EmptyId(usize),
    #[error("Duplicate puzzle id: {0}")]
    DuplicateId(String),
    #[error("Puzzle {0} has an empty flag")]
    EmptyFlag(String),
    #[error("Failed to read catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid catalog file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read artifact {path:?}: {source}")]
    ArtifactRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Inline artifact {file_name} is not valid base64: {source}")]
    ArtifactDecode {
        file_name: String,
        source: base64::DecodeError,
    },
}

/// Where the bytes of a downloadable artifact come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Path relative to the portal's artifact root.
    Path(String),
    /// Base64-encoded file contents, decoded at download time.
    Inline(String),
}

/// A file attached to a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub file_name: String,
    #[serde(flatten)]
    pub source: ArtifactSource,
}

/// A materialized artifact, ready to hand to the user under its original name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadBlob {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ArtifactRef {
    pub fn static_file(file_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source: ArtifactSource::Path(path.into()),
        }
    }

    pub fn inline(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.into(),
            source: ArtifactSource::Inline(base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }

    /// Produce the downloadable bytes for this artifact.
    ///
    /// Static paths are resolved against `root`; a leading `/` is ignored so
    /// web-style references (`/challenges/q1/file.txt`) stay inside the root.
    pub fn materialize(&self, root: &Path) -> Result<DownloadBlob, CatalogError> {
        let bytes = match &self.source {
            ArtifactSource::Path(path) => {
                let full = root.join(path.trim_start_matches('/'));
                std::fs::read(&full).map_err(|source| CatalogError::ArtifactRead {
                    path: full,
                    source,
                })?
            }
            ArtifactSource::Inline(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|source| CatalogError::ArtifactDecode {
                    file_name: self.file_name.clone(),
                    source,
                })?,
        };

        Ok(DownloadBlob {
            file_name: self.file_name.clone(),
            bytes,
        })
    }
}

/// One puzzle. Never mutated after the catalog is built.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub artifact: Option<ArtifactRef>,
    pub correct_flag: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

// The flag must never end up in logs.
impl fmt::Debug for PuzzleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PuzzleDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("artifact", &self.artifact)
            .field("hints", &self.hints.len())
            .finish_non_exhaustive()
    }
}

impl PuzzleDefinition {
    /// Exact, case-sensitive comparison after trimming surrounding whitespace
    /// from the candidate.
    pub fn check_flag(&self, candidate: &str) -> bool {
        candidate.trim() == self.correct_flag
    }

    pub fn view(&self) -> PuzzleView {
        PuzzleView {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            hints: self.hints.clone(),
            artifact_name: self.artifact.as_ref().map(|a| a.file_name.clone()),
        }
    }
}

/// What the presentation layer is allowed to see of a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub hints: Vec<String>,
    pub artifact_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    puzzles: Vec<PuzzleDefinition>,
}

/// Ordered, immutable puzzle pool with unique ids.
#[derive(Debug, Clone)]
pub struct PuzzleCatalog {
    puzzles: Vec<PuzzleDefinition>,
    index: HashMap<String, usize>,
}

impl PuzzleCatalog {
    pub fn new(puzzles: Vec<PuzzleDefinition>) -> Result<Self, CatalogError> {
        if puzzles.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = HashMap::with_capacity(puzzles.len());
        for (pos, puzzle) in puzzles.iter().enumerate() {
            if puzzle.id.trim().is_empty() {
                return Err(CatalogError::EmptyId(pos));
            }
            if puzzle.correct_flag.is_empty() {
                return Err(CatalogError::EmptyFlag(puzzle.id.clone()));
            }
            if index.insert(puzzle.id.clone(), pos).is_some() {
                return Err(CatalogError::DuplicateId(puzzle.id.clone()));
            }
        }

        Ok(Self { puzzles, index })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::new(file.puzzles)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, id: &str) -> Option<&PuzzleDefinition> {
        self.index.get(id).map(|&pos| &self.puzzles[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PuzzleDefinition> {
        self.puzzles.iter()
    }

    /// Puzzles not yet in `completed`, in catalog order.
    pub fn available<'a>(&'a self, completed: &CompletedSet) -> Vec<&'a PuzzleDefinition> {
        self.puzzles
            .iter()
            .filter(|p| !completed.contains(&p.id))
            .collect()
    }

    /// Number of catalog puzzles present in `completed`. Ids the catalog does
    /// not know are ignored.
    pub fn solved_count(&self, completed: &CompletedSet) -> usize {
        completed.iter().filter(|id| self.contains(id)).count()
    }

    pub fn all_solved(&self, completed: &CompletedSet) -> bool {
        self.solved_count(completed) == self.len()
    }

    /// The five puzzles the portal ships with.
    pub fn builtin() -> Self {
        let puzzles = vec![
            PuzzleDefinition {
                id: "q1".into(),
                title: "The Cryptographer's Dilemma".into(),
                description: "You are a cybersecurity consultant investigating a breach at the \
                    Ministry of Digital Secrets. The lead cryptographer, Dr. Eliza Vance, \
                    disappeared just hours before the attack. The only thing she left behind was \
                    a strange, encrypted diary entry and a file on her desktop labeled \
                    cipher_collection.txt. Your team believes Dr. Vance was trying to leave a \
                    final, complex message before being abducted: a message hidden among decoys. \
                    The diary entry gives you a vital clue, but you must still figure out which \
                    cipher in the file holds the true flag and which ones are red herrings."
                    .into(),
                artifact: Some(ArtifactRef::static_file(
                    "cipher_collection.txt",
                    "challenges/q1/cipher_collection.txt",
                )),
                correct_flag: "CG{Guvf vf gur Synt!}".into(),
                hints: vec![
                    "This code is based on a simple rotational shift of 3 for every letter in the alphabet".into(),
                    "This message is encoded using Polybius square coordinates; you must first group the ciphertext by fives, then use a keyword to untangle the column order.".into(),
                    "The decryption key for this substitution is half the alphabet, meaning the shift applied to the ciphertext is equal to the length of the shift itself.".into(),
                ],
            },
            PuzzleDefinition {
                id: "q2".into(),
                title: "Pair Sum Optimization".into(),
                description: "You are auditing a data processing script for a university that \
                    needs to quickly count successful pairings of student IDs. You are given a \
                    large array of unique, positive, and sorted integer IDs. The university \
                    defines a successful pair as any two distinct IDs a, b in the array whose sum \
                    equals a specific target number, T. Your primary constraint is efficiency. \
                    Since the list is already sorted, you must devise an algorithm that counts \
                    all unique pairs in a single, highly optimized pass that avoids nested loops, \
                    a technique typically required for speed in large datasets."
                    .into(),
                artifact: None,
                correct_flag: "CG{TWO_POINTERS_ALGORITHM}".into(),
                hints: vec![
                    "Since the array is sorted, set one marker (a pointer) at the first element (index 0) and the second marker at the last element (index length - 1).".into(),
                    "At each step, you only need to calculate the sum of the elements at your two markers and compare it to T. If the sum is less than T, you must increase the sum, so move the low pointer one step inward. If the sum is greater than T, you must decrease the sum, so move the high pointer one step inward.".into(),
                    "Your entire solution can be contained within a simple while loop that continues as long as your low pointer is less than your high pointer.".into(),
                ],
            },
            PuzzleDefinition {
                id: "q3".into(),
                title: "The Security Key Reverser".into(),
                description: "You have recovered a C program designed to validate a 10-character \
                    security key. Due to poor programming practices, the key must pass through a \
                    two-step obfuscation process before it is checked against a hardcoded \
                    secret. To find the correct final flag, you must meticulously trace the logic \
                    of the processkey function."
                    .into(),
                artifact: Some(ArtifactRef::static_file(
                    "security.c",
                    "challenges/q3/security.c",
                )),
                correct_flag: "CG{5E4D3A1B2C}".into(),
                hints: vec![
                    "Swap the two halves: the key is split (A1B2C and 3D4E5) and exchanged.".into(),
                    "Reverse the new first half in place: after swapping, reverse indices 0 through 4.".into(),
                    "The flag is the final state of the key array after processing.".into(),
                ],
            },
            PuzzleDefinition {
                id: "q4".into(),
                title: "Invisible Ink Scenario".into(),
                description: "You have recovered a text file, secretnote.txt, which appears to \
                    contain nothing more than a simple, innocuous sentence. When you copy and \
                    paste the text, it seems normal, but a forensic tool confirms the file size \
                    is slightly larger than expected for the visible characters. Hidden \
                    zero-width Unicode characters encode the flag."
                    .into(),
                artifact: Some(ArtifactRef::static_file(
                    "secretnote.txt",
                    "challenges/q4/secretnote.txt",
                )),
                correct_flag: "CG{THIS_YOUR_FLAG}".into(),
                hints: vec![
                    "Zero-width characters (U200B, U200D) represent binary digits and encode ASCII via invisible text.".into(),
                    "Use a specialized tool to extract and translate the invisible Unicode sequence.".into(),
                    "Correct mapping from invisible characters to binary unlocks the true ASCII flag.".into(),
                ],
            },
            PuzzleDefinition {
                id: "q5".into(),
                title: "The Final Register Readout".into(),
                description: "You are a penetration tester attempting to recover a sensitive \
                    6-character access key stored in a proprietary system. You have managed to \
                    dump the raw memory register, but the developer didn't use standard decimal \
                    numbers. Instead, they used a custom 'Quinary System' encoding where all \
                    values are calculated using powers of five before being stored. The \
                    captured, encoded register value (in the Quinary System) is the following \
                    sequence of three-digit numbers separated by colons: \
                    (313 : 310 : 314 : 421 : 322 : 310)"
                    .into(),
                artifact: None,
                correct_flag: "CG{SPToWP}".into(),
                hints: vec![
                    "Each three-digit number represents a character in the ASCII range".into(),
                    "Convert each quinary number to decimal using powers of 5".into(),
                    "Map the resulting decimal values to ASCII characters".into(),
                ],
            },
        ];

        let index = puzzles
            .iter()
            .enumerate()
            .map(|(pos, p)| (p.id.clone(), pos))
            .collect();
        Self { puzzles, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(id: &str, flag: &str) -> PuzzleDefinition {
        PuzzleDefinition {
            id: id.to_string(),
            title: format!("Puzzle {id}"),
            description: String::new(),
            artifact: None,
            correct_flag: flag.to_string(),
            hints: vec![],
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = PuzzleCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.get("q3").is_some());
        assert!(catalog.get("q2").unwrap().artifact.is_none());
    }

    #[test]
    fn test_builtin_hints_are_complete() {
        let catalog = PuzzleCatalog::builtin();
        let q2 = catalog.get("q2").unwrap();
        assert_eq!(q2.hints.len(), 3);
        assert!(q2.hints[1].contains("If the sum is less than T, you must increase the sum, so move the low pointer"));
        assert!(q2.hints[1].contains("you must decrease the sum, so move the high pointer"));
        assert!(catalog.iter().all(|p| p.hints.len() == 3));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = PuzzleCatalog::new(vec![puzzle("a", "x"), puzzle("a", "y")]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_rejects_empty_catalog_and_flag() {
        assert!(matches!(PuzzleCatalog::new(vec![]), Err(CatalogError::Empty)));
        assert!(matches!(
            PuzzleCatalog::new(vec![puzzle("a", "")]),
            Err(CatalogError::EmptyFlag(_))
        ));
        assert!(matches!(
            PuzzleCatalog::new(vec![puzzle(" ", "x")]),
            Err(CatalogError::EmptyId(0))
        ));
    }

    #[test]
    fn test_check_flag_trims_but_is_case_sensitive() {
        let p = puzzle("a", "CG{A}");
        assert!(p.check_flag("CG{A}"));
        assert!(p.check_flag("  CG{A}\n"));
        assert!(!p.check_flag("cg{a}"));
        assert!(!p.check_flag("CG{ A}"));
        assert!(!p.check_flag(""));
    }

    #[test]
    fn test_debug_redacts_flag() {
        let p = puzzle("a", "CG{SECRET}");
        let rendered = format!("{:?}", p);
        assert!(!rendered.contains("SECRET"));
        assert!(rendered.contains("\"a\""));
    }

    #[test]
    fn test_available_and_solved_count() {
        let catalog =
            PuzzleCatalog::new(vec![puzzle("p1", "1"), puzzle("p2", "2"), puzzle("p3", "3")])
                .unwrap();
        let mut done = CompletedSet::default();
        done.insert("p2");
        done.insert("retired");

        let ids: Vec<_> = catalog.available(&done).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
        assert_eq!(catalog.solved_count(&done), 1);
        assert!(!catalog.all_solved(&done));

        done.insert("p1");
        done.insert("p3");
        assert!(catalog.all_solved(&done));
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            [[puzzles]]
            id = "p1"
            title = "First"
            description = "desc"
            correct_flag = "CG{ONE}"
            hints = ["h1"]

            [puzzles.artifact]
            file_name = "notes.txt"
            inline = "aGVsbG8="

            [[puzzles]]
            id = "p2"
            title = "Second"
            description = "desc"
            correct_flag = "CG{TWO}"

            [puzzles.artifact]
            file_name = "data.bin"
            path = "/challenges/p2/data.bin"
        "#;
        let catalog = PuzzleCatalog::from_toml_str(text).unwrap();
        assert_eq!(catalog.len(), 2);

        let first = catalog.get("p1").unwrap();
        assert_eq!(first.hints, vec!["h1".to_string()]);
        assert_eq!(
            first.artifact.as_ref().unwrap().source,
            ArtifactSource::Inline("aGVsbG8=".into())
        );

        let second = catalog.get("p2").unwrap();
        assert!(second.hints.is_empty());
        assert_eq!(
            second.artifact.as_ref().unwrap().source,
            ArtifactSource::Path("/challenges/p2/data.bin".into())
        );
    }

    #[test]
    fn test_materialize_inline_artifact() {
        let artifact = ArtifactRef::inline("note.txt", b"hidden\xe2\x80\x8bflag");
        let blob = artifact.materialize(Path::new("/nonexistent")).unwrap();
        assert_eq!(blob.file_name, "note.txt");
        assert_eq!(blob.bytes, b"hidden\xe2\x80\x8bflag".to_vec());
    }

    #[test]
    fn test_materialize_bad_inline_artifact() {
        let artifact = ArtifactRef {
            file_name: "x".into(),
            source: ArtifactSource::Inline("not base64!!".into()),
        };
        assert!(matches!(
            artifact.materialize(Path::new(".")),
            Err(CatalogError::ArtifactDecode { .. })
        ));
    }

    #[test]
    fn test_materialize_static_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("challenges/q1")).unwrap();
        std::fs::write(dir.path().join("challenges/q1/c.txt"), "cipher").unwrap();

        let artifact = ArtifactRef::static_file("c.txt", "/challenges/q1/c.txt");
        let blob = artifact.materialize(dir.path()).unwrap();
        assert_eq!(blob.bytes, b"cipher".to_vec());

        let missing = ArtifactRef::static_file("m.txt", "challenges/missing.txt");
        assert!(matches!(
            missing.materialize(dir.path()),
            Err(CatalogError::ArtifactRead { .. })
        ));
    }
}
