// Vocabulary contrast — word counts and weighted log-odds scoring.

pub mod index;
pub mod logodds;
