use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::ids::BoardId;
use crate::node::{Node, UserRef};

/// The aggregate persisted unit: one moodboard graph and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub owner: UserRef,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Board {
    pub fn new(title: &str, owner: UserRef) -> Self {
        Self {
            id: BoardId::new(),
            title: title.to_string(),
            owner,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}
