pub mod graph_edges;
pub mod graph_nodes;
