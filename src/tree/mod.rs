// Linkage tree input and leaf-set annotation.

pub mod annotate;
pub mod linkage;
