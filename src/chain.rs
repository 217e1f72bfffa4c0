//! ChainTable: structural layer of fixed buckets holding collision chains.
//!
//! Nodes live in a generational arena; each bucket stores the key of its
//! first node and each node the key of the next. Chains are therefore
//! singly linked lists without raw pointers, and every walk is a loop, so
//! long chains cost no stack. New nodes are appended at the chain tail.

use slotmap::{new_key_type, SlotMap};

use crate::error::{AllocTarget, DictError, Result};
use crate::key::KeyKind;
use crate::value::Value;

new_key_type! {
    /// Arena key of a chain node.
    pub(crate) struct NodeKey;
}

#[derive(Debug)]
pub(crate) struct ChainNode<'v> {
    pub(crate) kind: KeyKind,
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Value<'v>,
    next: Option<NodeKey>,
}

impl<'v> ChainNode<'v> {
    pub(crate) fn new(kind: KeyKind, key: Box<[u8]>, value: Value<'v>) -> Self {
        Self {
            kind,
            key,
            value,
            next: None,
        }
    }

    #[inline]
    fn matches(&self, kind: KeyKind, key: &[u8]) -> bool {
        self.kind == kind && *self.key == *key
    }
}

pub(crate) struct ChainTable<'v> {
    heads: Box<[Option<NodeKey>]>,
    nodes: SlotMap<NodeKey, ChainNode<'v>>,
}

impl<'v> ChainTable<'v> {
    /// Allocate `bucket_count` empty chains.
    pub(crate) fn try_with_buckets(bucket_count: usize) -> Result<Self> {
        if bucket_count == 0 {
            return Err(DictError::InvalidConfig {
                reason: "bucket count must be at least 1",
            });
        }
        let mut heads = Vec::new();
        heads.try_reserve_exact(bucket_count).map_err(|source| {
            DictError::allocation(
                AllocTarget::Buckets,
                bucket_count.saturating_mul(core::mem::size_of::<Option<NodeKey>>()),
                source,
            )
        })?;
        heads.resize(bucket_count, None);
        Ok(Self {
            heads: heads.into_boxed_slice(),
            nodes: SlotMap::with_key(),
        })
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        // Bucket counts are non-zero, so the remainder is below `usize::MAX`.
        (hash % self.heads.len() as u64) as usize
    }

    /// Iterate the node keys of one chain, head first.
    pub(crate) fn chain(&self, bucket: usize) -> Chain<'_, 'v> {
        Chain {
            nodes: &self.nodes,
            cur: self.heads.get(bucket).copied().flatten(),
        }
    }

    pub(crate) fn find(&self, bucket: usize, kind: KeyKind, key: &[u8]) -> Option<NodeKey> {
        self.chain(bucket)
            .find(|(_, node)| node.matches(kind, key))
            .map(|(k, _)| k)
    }

    pub(crate) fn node(&self, k: NodeKey) -> Option<&ChainNode<'v>> {
        self.nodes.get(k)
    }

    pub(crate) fn node_mut(&mut self, k: NodeKey) -> Option<&mut ChainNode<'v>> {
        self.nodes.get_mut(k)
    }

    /// Link `node` at the tail of `bucket`'s chain. The caller has checked
    /// that its key is not already present.
    pub(crate) fn append(&mut self, bucket: usize, node: ChainNode<'v>) -> NodeKey {
        let tail = self.chain(bucket).last().map(|(k, _)| k);
        let k = self.nodes.insert(node);
        match tail.and_then(|t| self.nodes.get_mut(t)) {
            Some(t) => t.next = Some(k),
            None => self.heads[bucket] = Some(k),
        }
        k
    }

    /// Unlink and return the node matching `(kind, key)` in `bucket`.
    pub(crate) fn unlink(
        &mut self,
        bucket: usize,
        kind: KeyKind,
        key: &[u8],
    ) -> Option<ChainNode<'v>> {
        let mut prev: Option<NodeKey> = None;
        let mut cur = self.heads[bucket];
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if node.matches(kind, key) {
                let next = node.next;
                match prev {
                    Some(p) => self.nodes[p].next = next,
                    None => self.heads[bucket] = next,
                }
                return self.nodes.remove(k);
            }
            prev = cur;
            cur = node.next;
        }
        None
    }

    /// Count entries by walking every chain.
    pub(crate) fn count(&self) -> usize {
        let n: usize = (0..self.heads.len()).map(|b| self.chain(b).count()).sum();
        debug_assert_eq!(n, self.nodes.len(), "chains and arena disagree");
        n
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, bucket by bucket in chain order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ChainNode<'v>> + '_ {
        (0..self.heads.len()).flat_map(move |b| self.chain(b).map(|(_, n)| n))
    }

    /// Drop every node and empty every bucket.
    pub(crate) fn clear(&mut self) {
        self.heads.iter_mut().for_each(|h| *h = None);
        self.nodes.clear();
    }
}

/// Iterator over one chain.
pub(crate) struct Chain<'a, 'v> {
    nodes: &'a SlotMap<NodeKey, ChainNode<'v>>,
    cur: Option<NodeKey>,
}

impl<'a, 'v> Iterator for Chain<'a, 'v> {
    type Item = (NodeKey, &'a ChainNode<'v>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur?;
        let node = self.nodes.get(k)?;
        self.cur = node.next;
        Some((k, node))
    }
}
