//! End-to-end dataset builds over small on-disk fixtures

mod common;

use common::{knowtator_xml, pbdms_line, DataRoot, HP_ONTOLOGY, MEDIC_ONTOLOGY, TOY_ONTOLOGY};
use evanil::baseline::answers_path;
use evanil::corpus::ExtractError;
use evanil::dataset::{retrieve_annotations, Subset};
use evanil::{CorpusStatistics, KnowledgeBase, Pipeline, PipelineError};
use std::sync::Arc;

#[tokio::test]
async fn test_toy_ontology_keeps_only_single_ancestor_mentions() {
    let root = DataRoot::new();
    root.write_kb(KnowledgeBase::Chebi, TOY_ONTOLOGY);
    root.write_craft(
        "CHEBI",
        "11532192",
        &knowtator_xml(
            &[
                ("m1", "CHEBI:10", 0, 5, "alpha"),
                ("m2", "CHEBI:30", 10, 15, "gamma"),
            ],
            false,
        ),
    );

    let pipeline = Pipeline::new(root.config()).unwrap();
    let reports = pipeline.build(KnowledgeBase::Chebi, None).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].split, None);
    assert_eq!(reports[0].partition.total(), 1);
    assert_eq!(reports[0].corpora[0].stats.unmapped, 1);

    let all = retrieve_annotations(&root.output_root(), KnowledgeBase::Chebi, None, 1).unwrap();
    assert_eq!(all.annotation_count(), 1);
    let doc = all.get("11532192").unwrap();
    assert_eq!(doc[0].text, "alpha");
    assert_eq!(doc[0].concept_id, "CHEBI:10");
    assert_eq!(doc[0].ancestor_id, "CHEBI:20");
    assert_eq!((doc[0].start, doc[0].end), (0, 5));
}

#[tokio::test]
async fn test_failed_document_does_not_stop_the_pass() {
    let root = DataRoot::new();
    root.write_kb(KnowledgeBase::Chebi, TOY_ONTOLOGY);
    for n in 1..=5 {
        let xml = knowtator_xml(&[("m1", "CHEBI:10", 0, 5, "alpha")], n == 3);
        root.write_craft("CHEBI", &format!("doc{}", n), &xml);
    }

    let pipeline = Pipeline::new(root.config()).unwrap();
    let index = Arc::new(pipeline.load_kb(KnowledgeBase::Chebi).unwrap());
    let build = pipeline.build_annotations(&index, None).await.unwrap();

    assert_eq!(build.annotations.len(), 4);
    assert!(!build.annotations.contains("doc3"));
    assert_eq!(build.corpora.len(), 1);
    assert_eq!(build.corpora[0].failed_documents, 1);
}

fn write_medic_fixtures(root: &DataRoot) {
    root.write_kb(KnowledgeBase::Medic, MEDIC_ONTOLOGY);
    root.write_pbdms(
        1,
        &[
            pbdms_line(
                "p1",
                &[
                    ("myocardial infarction", 0, 21, "D009203"),
                    ("diabetes", 30, 38, "MESH:D003920"),
                ],
            ),
            pbdms_line("shared", &[("heart disease", 4, 17, "D006331")]),
            pbdms_line("p_empty", &[]),
        ],
    );

    let ncbi = "corpora/NCBI_disease_corpus";
    root.write(
        format!("{}/NCBItrainset_corpus.txt", ncbi),
        "n1|t|Heart attack in the young\nn1\t0\t12\theart attack\tSpecificDisease\tD009203\n\n",
    );
    root.write(format!("{}/NCBIdevelopset_corpus.txt", ncbi), "n2|t|Nothing here\n\n");
    root.write(format!("{}/NCBItestset_corpus.txt", ncbi), "");

    let cdr = "corpora/BioCreative-V-CDR-Corpus/CDR_Data/CDR.Corpus.v010516";
    root.write(
        format!("{}/CDR_TrainingSet.PubTator.txt", cdr),
        "shared|t|Naloxone and cardiovascular disease\n\
         shared\t0\t8\tNaloxone\tChemical\tD009270\n\
         shared\t13\t35\tcardiovascular disease\tDisease\tD002318\n",
    );
    root.write(format!("{}/CDR_DevelopmentSet.PubTator.txt", cdr), "");
    root.write(format!("{}/CDR_TestSet.PubTator.txt", cdr), "");
}

#[tokio::test]
async fn test_medic_split_one_merges_three_corpora() {
    let root = DataRoot::new();
    write_medic_fixtures(&root);

    let pipeline = Pipeline::new(root.config()).unwrap();
    let index = Arc::new(pipeline.load_kb(KnowledgeBase::Medic).unwrap());
    let build = pipeline.build_annotations(&index, Some(1)).await.unwrap();

    let corpora: Vec<&str> = build.corpora.iter().map(|c| c.corpus).collect();
    assert_eq!(corpora, vec!["pbdms", "ncbi_disease", "bc5cdr"]);
    assert_eq!(build.collisions, 1);

    let ann = &build.annotations;
    assert_eq!(ann.len(), 3);
    assert!(!ann.contains("p_empty"));

    let p1 = ann.get("p1").unwrap();
    assert_eq!(p1.len(), 1);
    assert_eq!(p1[0].concept_id, "MESH:D009203");
    assert_eq!(p1[0].ancestor_id, "MESH:D006331");

    let n1 = ann.get("n1").unwrap();
    assert_eq!(n1[0].concept_id, "D009203");

    // BC5CDR comes last and replaces the PBDMS list for the shared id
    let shared = ann.get("shared").unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].concept_id, "https://id.nlm.nih.gov/mesh/D002318");
    assert_eq!(shared[0].ancestor_id, "https://id.nlm.nih.gov/mesh/C");
}

#[tokio::test]
async fn test_medic_build_then_stats_and_baseline() {
    let root = DataRoot::new();
    write_medic_fixtures(&root);

    let pipeline = Pipeline::new(root.config()).unwrap();
    let reports = pipeline.build(KnowledgeBase::Medic, None).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].split, Some(1));
    assert!(reports[0].output.ends_with("medic/split_1"));
    for subset in Subset::ALL {
        assert!(reports[0].output.join(subset.file_name()).is_file());
    }

    let all = retrieve_annotations(&root.output_root(), KnowledgeBase::Medic, None, 1).unwrap();
    let stats = CorpusStatistics::compute(&all);
    assert_eq!(stats.documents, 3);
    assert_eq!(stats.annotations, 3);

    let test = retrieve_annotations(&root.output_root(), KnowledgeBase::Medic, Some(Subset::Test), 1).unwrap();
    let report = pipeline.run_baseline(KnowledgeBase::Medic).await.unwrap();
    assert_eq!(report.documents, test.len());
    assert!(answers_path(&root.output_root(), KnowledgeBase::Medic).is_file());
}

#[tokio::test]
async fn test_hp_medmentions_wins_over_pgr() {
    let root = DataRoot::new();
    root.write_kb(KnowledgeBase::Hp, HP_ONTOLOGY);
    root.write(
        "corpora/PGR/train.tsv",
        "pmid\tsid\tgene\tphenotype\tgene_id\thpo_id\tgs\tge\tps\tpe\trel\n\
         100\t0\tSCN1A\tseizures\t6323\tHP_0001250\t0\t5\t10\t18\tTrue\n\
         200\t0\tSCN2A\tseizure\t6326\tHP_0001250\t0\t5\t20\t27\tTrue\n",
    );
    root.write(
        "corpora/PGR/test.tsv",
        "pmid\tsid\tgene\tphenotype\tgene_id\thpo_id\tgs\tge\tps\tpe\trel\n",
    );
    root.write(
        "corpora/MedMentions/corpus_pubtator.txt",
        "100|t|Febrile seizures\n100|a|Abstract\n100\t8\t16\tseizures\tT047\tUMLS:C0036572\n\n",
    );

    let pipeline = Pipeline::new(root.config()).unwrap();
    let index = Arc::new(pipeline.load_kb(KnowledgeBase::Hp).unwrap());
    let build = pipeline.build_annotations(&index, None).await.unwrap();

    assert_eq!(build.collisions, 1);
    assert_eq!(build.annotations.get("100").unwrap()[0].start, 8);
    assert_eq!(build.annotations.get("200").unwrap()[0].ancestor_id, "HP:0012638");
}

#[tokio::test]
async fn test_missing_corpus_is_fatal() {
    let root = DataRoot::new();
    let mut thesaurus = "# header\n".repeat(29);
    thesaurus.push_str("Heart\tMESH:D006321\t\tA07.541\tMESH:D002319\t\t\t\n");
    root.write_kb(KnowledgeBase::CtdAnatomy, &thesaurus);

    let pipeline = Pipeline::new(root.config()).unwrap();
    let err = pipeline.build(KnowledgeBase::CtdAnatomy, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Extract {
            source: ExtractError::SourceNotFound { .. },
            ..
        }
    ));
}
