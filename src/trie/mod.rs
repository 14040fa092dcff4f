//! Instance trie (§5): a prefix tree over permuted feature-value paths,
//! plus the traversal algorithms (§6) that classify by walking it
//! without doing a full nearest-neighbor search — IGTree, TRIBL, TRIBL2.

pub mod algorithms;
pub mod node;
pub mod root;
pub mod serialize;

pub use node::TrieNode;
pub use root::DefaultsMode;
pub use root::SizeInfo;
pub use root::TrieRoot;
