//! The wildcard-aware trie a Sublist walks on every insert/remove/match.
//!
//! A [`Level`] is a set of named children plus the two special wildcard
//! slots (`*` and `>`); a [`Node`] is what lives at the end of a token —
//! its own plain/queue subscriptions, and (if the subject continues) the
//! next `Level` down.

use crate::subscription::Subscription;
use broker_protocol::Token;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct Node {
    pub(crate) next: Option<Box<Level>>,
    pub(crate) psubs: Vec<Arc<Subscription>>,
    pub(crate) qsubs: HashMap<Box<str>, Vec<Arc<Subscription>>>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.psubs.is_empty() && self.qsubs.is_empty() && self.next.as_ref().map_or(true, |l| l.is_empty())
    }

    fn add(&mut self, sub: Arc<Subscription>) {
        match &sub.queue {
            Some(q) => self.qsubs.entry(q.clone()).or_default().push(sub),
            None => self.psubs.push(sub),
        }
    }

    /// Removes `sub` from this node by identity. Returns whether it was
    /// found.
    fn remove(&mut self, sub: &Subscription) -> bool {
        if let Some(pos) = self.psubs.iter().position(|s| s.id == sub.id) {
            self.psubs.swap_remove(pos);
            return true;
        }
        if let Some(q) = &sub.queue {
            if let Some(bucket) = self.qsubs.get_mut(q.as_ref()) {
                if let Some(pos) = bucket.iter().position(|s| s.id == sub.id) {
                    bucket.swap_remove(pos);
                    if bucket.is_empty() {
                        self.qsubs.remove(q.as_ref());
                    }
                    return true;
                }
            }
        }
        false
    }
}

#[derive(Default)]
pub(crate) struct Level {
    pub(crate) nodes: HashMap<Box<[u8]>, Node>,
    pub(crate) pwc: Option<Box<Node>>,
    pub(crate) fwc: Option<Box<Node>>,
}

impl Level {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.pwc.is_none() && self.fwc.is_none()
    }
}

/// Walks/creates the path for `tokens`, returning the terminal node.
pub(crate) fn insert_path<'a>(root: &'a mut Level, tokens: &[Token]) -> &'a mut Node {
    let mut level = root;
    let mut iter = tokens.iter().peekable();
    loop {
        let tok = iter.next().expect("tokens is non-empty");
        let is_last = iter.peek().is_none();
        let node: &mut Node = match tok {
            Token::Star => level.pwc.get_or_insert_with(|| Box::new(Node::default())),
            Token::GreaterThan => level.fwc.get_or_insert_with(|| Box::new(Node::default())),
            Token::Literal(s) => level
                .nodes
                .entry(s.as_bytes().into())
                .or_insert_with(Node::default),
        };
        if is_last {
            return node;
        }
        level = node.next.get_or_insert_with(|| Box::new(Level::default()));
    }
}

pub(crate) fn insert(root: &mut Level, tokens: &[Token], sub: Arc<Subscription>) {
    insert_path(root, tokens).add(sub);
}

/// Removes `sub` by identity, pruning empty nodes/levels back up the path.
/// Returns `true` if it was found and removed.
pub(crate) fn remove(root: &mut Level, tokens: &[Token], sub: &Subscription) -> bool {
    remove_at(root, tokens, sub)
}

fn remove_at(level: &mut Level, tokens: &[Token], sub: &Subscription) -> bool {
    let (tok, rest) = match tokens.split_first() {
        Some(pair) => pair,
        None => return false,
    };
    let found = if rest.is_empty() {
        match tok {
            Token::Star => level.pwc.as_mut().map_or(false, |n| n.remove(sub)),
            Token::GreaterThan => level.fwc.as_mut().map_or(false, |n| n.remove(sub)),
            Token::Literal(s) => level
                .nodes
                .get_mut(s.as_bytes())
                .map_or(false, |n| n.remove(sub)),
        }
    } else {
        match tok {
            Token::Star => level
                .pwc
                .as_mut()
                .and_then(|n| n.next.as_mut())
                .map_or(false, |next| remove_at(next, rest, sub)),
            Token::GreaterThan => level
                .fwc
                .as_mut()
                .and_then(|n| n.next.as_mut())
                .map_or(false, |next| remove_at(next, rest, sub)),
            Token::Literal(s) => level
                .nodes
                .get_mut(s.as_bytes())
                .and_then(|n| n.next.as_mut())
                .map_or(false, |next| remove_at(next, rest, sub)),
        }
    };

    if found {
        prune(level, tok);
    }
    found
}

fn prune(level: &mut Level, tok: &Token) {
    match tok {
        Token::Star => {
            if level.pwc.as_ref().is_some_and(|n| n.is_empty()) {
                level.pwc = None;
            }
        }
        Token::GreaterThan => {
            if level.fwc.as_ref().is_some_and(|n| n.is_empty()) {
                level.fwc = None;
            }
        }
        Token::Literal(s) => {
            let key = s.as_bytes();
            if level.nodes.get(key).is_some_and(|n| n.is_empty()) {
                level.nodes.remove(key);
            }
        }
    }
}

fn collect_node(node: &Node, psubs: &mut Vec<Arc<Subscription>>, qsubs: &mut HashMap<Box<str>, Vec<Arc<Subscription>>>) {
    psubs.extend(node.psubs.iter().cloned());
    for (q, subs) in &node.qsubs {
        qsubs.entry(q.clone()).or_default().extend(subs.iter().cloned());
    }
}

/// The actual matching walk: tracks the *nodes* reached so far (not just
/// their child levels), so leaf subscriptions at any depth are collected
/// once the token stream is exhausted, while `>` is collected eagerly at
/// every step regardless of depth.
pub(crate) fn walk_match(root: &Level, tokens: &[&[u8]], psubs: &mut Vec<Arc<Subscription>>, qsubs: &mut HashMap<Box<str>, Vec<Arc<Subscription>>>) {
    let mut current: Vec<&Node> = Vec::new();
    let mut levels: Vec<&Level> = vec![root];

    for (idx, tok) in tokens.iter().enumerate() {
        let is_last = idx == tokens.len() - 1;
        let mut next_levels = Vec::new();
        let mut next_nodes = Vec::new();

        for level in &levels {
            if let Some(fwc) = &level.fwc {
                collect_node(fwc, psubs, qsubs);
            }
            if let Some(pwc) = &level.pwc {
                if is_last {
                    next_nodes.push(pwc.as_ref());
                } else if let Some(child) = &pwc.next {
                    next_levels.push(child.as_ref());
                }
            }
            if let Some(node) = level.nodes.get(*tok) {
                if is_last {
                    next_nodes.push(node);
                } else if let Some(child) = &node.next {
                    next_levels.push(child.as_ref());
                }
            }
        }

        levels = next_levels;
        if is_last {
            current = next_nodes;
        }
    }

    for node in current {
        collect_node(node, psubs, qsubs);
    }
}
