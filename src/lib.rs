// Strata: hierarchical subgroup discovery over text embeddings
//
// This is the library root. Each module corresponds to one stage of the
// pipeline, from the linkage tree to the subgroup table.

pub mod config;
pub mod corpus;
pub mod output;
pub mod pipeline;
pub mod subgroups;
pub mod tree;
pub mod vocabulary;
