//! Common test utilities for EvaNIL integration tests
//!
//! Builds a throwaway data root laid out like `retrieved_data/` with small
//! KB files and corpora, so the pipeline can run end to end.

#![allow(dead_code)]

use evanil::{KnowledgeBase, PipelineConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// ChEBI-shaped toy ontology: A has one parent (B), C has two (D, E)
pub const TOY_ONTOLOGY: &str = r#"format-version: 1.2
ontology: chebi

[Term]
id: CHEBI:20
name: beta

[Term]
id: CHEBI:40
name: delta

[Term]
id: CHEBI:50
name: epsilon

[Term]
id: CHEBI:10
name: alpha
is_a: CHEBI:20

[Term]
id: CHEBI:30
name: gamma
is_a: CHEBI:40
is_a: CHEBI:50
"#;

/// MEDIC-shaped ontology with `MESH:` ids and one OMIM entry
pub const MEDIC_ONTOLOGY: &str = r#"format-version: 1.2
ontology: medic

[Term]
id: MESH:C
name: Diseases

[Term]
id: MESH:D002318
name: Cardiovascular Diseases
is_a: MESH:C

[Term]
id: MESH:D006331
name: Heart Diseases
is_a: MESH:D002318

[Term]
id: MESH:D009203
name: Myocardial Infarction
is_a: MESH:D006331

[Term]
id: MESH:D003920
name: Diabetes Mellitus
is_a: MESH:D044882
is_a: MESH:D004700

[Term]
id: OMIM:125853
name: Diabetes Mellitus, Noninsulin-Dependent
is_a: MESH:D003920
"#;

/// HPO-shaped ontology with UMLS cross-references
pub const HP_ONTOLOGY: &str = r#"format-version: 1.2
ontology: hp

[Term]
id: HP:0000001
name: All

[Term]
id: HP:0012638
name: Abnormal nervous system physiology
is_a: HP:0000001

[Term]
id: HP:0001250
name: Seizure
is_a: HP:0012638
xref: UMLS:C0036572

[Term]
id: HP:0002027
name: Abdominal pain
is_a: HP:0011458
is_a: HP:0012531
xref: UMLS:C0000737
"#;

/// One knowtator mention: `(mention id, concept id, start, end, text)`
pub type Mention<'a> = (&'a str, &'a str, u64, u64, &'a str);

/// Render a knowtator document; `dangling` adds a class mention whose
/// mention id has no `<annotation>`
pub fn knowtator_xml(mentions: &[Mention<'_>], dangling: bool) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<annotations textSource=\"doc.txt\">\n");
    for (id, _, start, end, text) in mentions {
        xml.push_str(&format!(
            "  <annotation>\n    <mention id=\"{id}\" />\n    <annotator id=\"CRAFT\">CRAFT</annotator>\n    <span start=\"{start}\" end=\"{end}\" />\n    <spannedText>{text}</spannedText>\n  </annotation>\n"
        ));
    }
    for (id, concept, _, _, text) in mentions {
        xml.push_str(&format!(
            "  <classMention id=\"{id}\">\n    <mentionClass id=\"{concept}\">{text}</mentionClass>\n  </classMention>\n"
        ));
    }
    if dangling {
        xml.push_str(
            "  <classMention id=\"CRAFT_Instance_missing\">\n    <mentionClass id=\"CHEBI:10\">alpha</mentionClass>\n  </classMention>\n",
        );
    }
    xml.push_str("</annotations>\n");
    xml
}

/// One PBDMS split line
pub fn pbdms_line(id: &str, mentions: &[(&str, u64, u64, &str)]) -> String {
    let mentions: Vec<serde_json::Value> = mentions
        .iter()
        .map(|(text, start, end, mesh)| {
            serde_json::json!({
                "mention": text,
                "start_offset": start,
                "end_offset": end,
                "mesh_id": mesh,
            })
        })
        .collect();
    serde_json::json!({ "_id": id, "mentions": mentions }).to_string()
}

/// A temporary `retrieved_data/` plus an output directory
pub struct DataRoot {
    dir: TempDir,
}

impl DataRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("retrieved_data")
    }

    pub fn output_root(&self) -> PathBuf {
        self.dir.path().join("dataset")
    }

    /// Config pointing at this root, with one PBDMS split
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_data_root(self.data_root())
            .with_output_root(self.output_root())
            .with_pbdms_splits(1)
            .with_workers(3)
    }

    /// Write a file relative to the data root, creating parent directories
    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.data_root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn write_kb(&self, kb: KnowledgeBase, contents: &str) -> PathBuf {
        self.write(Path::new("kb_files").join(kb.file_name()), contents)
    }

    pub fn write_craft(&self, ontology: &str, document: &str, xml: &str) -> PathBuf {
        self.write(
            format!(
                "corpora/CRAFT-4.0.1/concept-annotation/{o}/{o}/knowtator/{d}.txt.knowtator.xml",
                o = ontology,
                d = document
            ),
            xml,
        )
    }

    pub fn write_pbdms(&self, split: u32, lines: &[String]) -> PathBuf {
        self.write(
            format!("corpora/pubmed_ds/split_{}.txt", split),
            &(lines.join("\n") + "\n"),
        )
    }
}

impl Default for DataRoot {
    fn default() -> Self {
        Self::new()
    }
}
