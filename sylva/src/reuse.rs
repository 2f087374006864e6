//! Walks the previous tree in document order and offers its clean nodes to
//! the parser, translating old offsets through the edit.

use crate::edit::Edit;
use crate::tree::{Subtree, Tree};

struct Frame<'a> {
    children: &'a [Subtree],
    index: usize,
    /// Old offset of `children[index]`.
    offset: usize,
}

pub(crate) struct ReuseCursor<'a> {
    edit: Edit,
    stack: Vec<Frame<'a>>,
}

impl<'a> ReuseCursor<'a> {
    /// The root itself is never offered, only its descendants.
    pub fn new(tree: &'a Tree, edit: Edit) -> Self {
        Self {
            edit,
            stack: vec![Frame {
                children: tree.root().children(),
                index: 0,
                offset: 0,
            }],
        }
    }

    /// The current node and its old offset.
    fn current(&self) -> Option<(&'a Subtree, usize)> {
        let frame = self.stack.last()?;
        frame
            .children
            .get(frame.index)
            .map(|node| (node, frame.offset))
    }

    /// Skips the current node.
    pub fn advance(&mut self) {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return;
            };
            if let Some(node) = frame.children.get(frame.index) {
                frame.offset += node.total();
                frame.index += 1;
            }
            if frame.index < frame.children.len() || self.stack.len() == 1 {
                return;
            }
            // The parent still points at the node just finished.
            self.stack.pop();
        }
    }

    /// Moves into the current node's first child; skips it if it is a leaf.
    pub fn descend(&mut self) {
        match self.current() {
            Some((node, offset)) if !node.children().is_empty() => self.stack.push(Frame {
                children: node.children(),
                index: 0,
                offset,
            }),
            Some(_) => self.advance(),
            None => {}
        }
    }

    /// The outermost clean old node that starts exactly at `pos` in the new
    /// input, skipping past everything that ends before it.
    pub fn peek(&mut self, pos: usize) -> Option<&'a Subtree> {
        loop {
            let (node, old_start) = self.current()?;
            if self.edit.touches(old_start, node.total() + node.lookahead()) {
                self.descend();
                continue;
            }
            let new_start = self.edit.map_start(old_start);
            if new_start > pos {
                return None;
            }
            if new_start < pos {
                if new_start + node.total() <= pos {
                    self.advance();
                } else {
                    self.descend();
                }
                continue;
            }
            return Some(node);
        }
    }
}
