// Composition tests — verifying that the pipeline stages chain together.
//
// These tests exercise the data flow between modules:
//   corpus JSON -> Corpus -> LinkageTree -> SubgroupTree -> SubgroupTable
// on the two-blob fixture, without touching anything but a temp file.

use serde_json::json;

use strata::corpus::loader;
use strata::output::table::SubgroupTable;
use strata::pipeline::analysis::{discover, summarize};
use strata::pipeline::exemplars::ExemplarRole;
use strata::pipeline::{run, PipelineParams};
use strata::tree::linkage::{parse_merges, LinkageTree};

const BLOBS: [[f64; 2]; 16] = [
    [-0.128, 0.256],
    [-0.113, -0.158],
    [-0.465, -0.107],
    [0.556, 0.212],
    [0.518, 0.124],
    [0.197, 0.093],
    [-0.833, 0.428],
    [0.253, 0.249],
    [9.154, 9.128],
    [9.555, 9.766],
    [10.153, 9.977],
    [10.26, 9.679],
    [10.154, 10.197],
    [9.669, 10.859],
    [10.278, 10.599],
    [9.69, 9.63],
];

const BLOBS_LINKAGE: &str = "[
    [3, 4, 0.095854, 2], [5, 7, 0.165747, 2], [9, 15, 0.191627, 2],
    [10, 12, 0.220002, 2], [1, 2, 0.355675, 2], [0, 17, 0.419260, 3],
    [11, 19, 0.486903, 3], [13, 14, 0.662179, 2], [16, 21, 0.667404, 5],
    [8, 18, 0.851972, 3], [6, 20, 0.901921, 3], [22, 23, 1.250655, 5],
    [24, 26, 1.473958, 8], [25, 27, 1.911061, 8], [28, 29, 39.416529, 16]
]";

/// Text `i` is a post for i = 0 and 8, a comment otherwise. Upvotes grow
/// with `i`, replies shrink. The first blob talks about sand and sun, the
/// second about ice and snow, both say "the" a lot.
fn text_id(i: usize) -> String {
    if i % 8 == 0 {
        format!("t3_{i}")
    } else {
        format!("t1_{i}")
    }
}

fn corpus_json() -> String {
    let mut ids: Vec<String> = (0..16).map(text_id).collect();
    let mut embeddings: Vec<Vec<f64>> = BLOBS.iter().map(|p| p.to_vec()).collect();
    ids.push("t2_north".to_string());
    embeddings.push(vec![10.05, 9.95]);
    ids.push("t2_south".to_string());
    embeddings.push(vec![0.05, -0.05]);

    let table = |i: usize| {
        if i < 8 {
            json!([["sand", 2], ["sun", 1], ["the", 3]])
        } else {
            json!([["ice", 2], ["snow", 1], ["the", 3]])
        }
    };

    let mut comments = Vec::new();
    let mut posts = Vec::new();
    for i in 0..16 {
        if i % 8 == 0 {
            posts.push(json!({
                "id": text_id(i),
                "total_upvotes": i,
                "total_direct_replies": 16 - i,
                "frequency_table": table(i),
            }));
        } else {
            comments.push(json!({
                "id": text_id(i),
                "upvotes": i,
                "direct_reply_count": 16 - i,
                "frequency_table": table(i),
            }));
        }
    }

    json!({
        "ids": ids,
        "embeddings": embeddings,
        "words": {
            "ice": {"frequency": 16},
            "sand": {"frequency": 16},
            "snow": {"frequency": 8},
            "sun": {"frequency": 8},
            "the": {"frequency": 48},
        },
        "comments": comments,
        "posts": posts,
        "users": {
            "t2_north": {"text_ids": ["t1_9", "t1_10"], "words": {"ice": {"frequency": 1}}},
            "t2_south": {"text_ids": ["t1_1"], "words": {"sun": {"frequency": 4}}},
            "t2_writer": {"text_ids": ["t1_9", "t1_10"], "words": {}},
        },
    })
    .to_string()
}

fn blobs_tree() -> LinkageTree {
    LinkageTree::from_merges(&parse_merges(BLOBS_LINKAGE).unwrap()).unwrap()
}

// ============================================================
// Chain: corpus -> subgroup tree
// ============================================================

#[test]
fn corpus_loads_texts_and_users() {
    let corpus = loader::parse(&corpus_json()).unwrap();
    assert_eq!(corpus.text_rows(), (0..16).collect::<Vec<_>>());
    assert_eq!(corpus.user_rows().len(), 3, "two given users plus one averaged");
    assert!(corpus.row_of("t2_writer").is_some());
    assert_eq!(corpus.global_vector(), vec![16.0, 16.0, 8.0, 8.0, 48.0]);
}

#[test]
fn users_land_in_their_blob() {
    let corpus = loader::parse(&corpus_json()).unwrap();
    let subgroups = discover(&corpus, &blobs_tree(), &PipelineParams::default()).unwrap();
    assert_eq!(subgroups.len(), 3);

    let north = corpus.row_of("t2_north").unwrap();
    let south = corpus.row_of("t2_south").unwrap();
    assert!(subgroups.node(2).matched_locs.contains(&north));
    assert!(!subgroups.node(1).matched_locs.contains(&north));
    assert!(subgroups.node(1).matched_locs.contains(&south));
    assert!(!subgroups.node(2).matched_locs.contains(&south));

    for node in subgroups.nodes() {
        assert_eq!(node.matched_locs.len(), node.matched_ids.len());
    }
}

#[test]
fn mismatched_linkage_is_rejected() {
    let corpus = loader::parse(&corpus_json()).unwrap();
    let small = LinkageTree::from_merges(&parse_merges("[[0, 1, 0.5, 2]]").unwrap()).unwrap();
    assert!(discover(&corpus, &small, &PipelineParams::default()).is_err());
}

// ============================================================
// Chain: subgroup tree -> table
// ============================================================

#[test]
fn table_contrasts_vocabulary() {
    let corpus = loader::parse(&corpus_json()).unwrap();
    let table = run(&corpus, &blobs_tree(), &PipelineParams::default()).unwrap();

    assert_eq!(table.vocabulary, vec!["ice", "sand", "snow", "sun", "the"]);
    assert_eq!(table.rows.len(), 3);

    let root = &table.rows[0];
    assert_eq!(root.parent_id, None);
    assert!(root.matched_user_ids.is_empty());
    assert!(root.wlogodds_z.iter().all(|z| z.abs() < 1e-12));

    let icy = &table.rows[2];
    assert_eq!(icy.parent_id, Some(0));
    assert_eq!(icy.depth, 1);
    assert_eq!(icy.word_count_summary, vec![16.0, 0.0, 8.0, 0.0, 24.0]);
    assert_eq!(icy.wlogodds_z[4], 0.0, "'the' is split evenly");
    let top: Vec<&str> = icy.top_words.iter().map(|w| w.word.as_str()).collect();
    assert_eq!(top, vec!["ice", "snow"]);
    let bottom: Vec<&str> = icy.bottom_words.iter().map(|w| w.word.as_str()).collect();
    assert!(bottom.contains(&"sand") && bottom.contains(&"sun"));
    assert!(icy.matched_user_ids.contains(&"t2_north".to_string()));
}

#[test]
fn exemplars_cover_roles_without_reuse() {
    let corpus = loader::parse(&corpus_json()).unwrap();
    let table = run(&corpus, &blobs_tree(), &PipelineParams::default()).unwrap();

    let icy = &table.rows[2];
    let roles: Vec<ExemplarRole> = icy.exemplars.iter().map(|e| e.role).collect();
    assert_eq!(
        roles,
        vec![
            ExemplarRole::MostCentral,
            ExemplarRole::MostUpvoted,
            ExemplarRole::MostReplied
        ]
    );
    let ids: Vec<&str> = icy.exemplars.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["t1_10", "t1_15", "t3_8"]);

    // Text 0 is both most central and most replied in the first blob
    let sandy = &table.rows[1];
    let ids: Vec<&str> = sandy.exemplars.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["t3_0", "t1_7", "t1_1"]);
}

#[test]
fn table_survives_json_round_trip() {
    let corpus = loader::parse(&corpus_json()).unwrap();
    let subgroups = discover(&corpus, &blobs_tree(), &PipelineParams::default()).unwrap();
    let table = summarize(&corpus, &subgroups, &PipelineParams::default()).unwrap();

    let path = std::env::temp_dir().join(format!("strata-table-{}.json", std::process::id()));
    table.write_json(&path).unwrap();
    let back = SubgroupTable::read_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(back.rows.len(), table.rows.len());
    assert_eq!(back.vocabulary, table.vocabulary);
    assert_eq!(back.rows[2].exemplars, table.rows[2].exemplars);
    assert_eq!(back.rows[2].member_leaf_indices, table.rows[2].member_leaf_indices);
}
