// src/detect/expand.rs

//! Order expansion
//!
//! Flattens an order whose groups may reference meta-buildpacks (a
//! buildpack whose descriptor carries its own order) into a lazy
//! sequence of leaf groups in lexicographic depth-first order. Each
//! meta reference is substituted in place by every group of its own
//! order, leftmost reference first, before any later candidate is
//! considered. Flags on the meta reference distribute onto the
//! substituted members.

use crate::buildpack::{Buildpack, BuildpackGroup, BuildpackOrder};
use crate::detect::Stores;
use crate::error::{Error, Result};
use std::collections::VecDeque;

/// Maximum substitution depth for nested meta-buildpack orders
const MAX_EXPANSION_DEPTH: usize = 16;

/// Lazy iterator over the flat groups of an order
pub(crate) struct GroupExpansion<'a> {
    stores: &'a Stores,
    pending: VecDeque<(usize, BuildpackGroup)>,
}

impl<'a> GroupExpansion<'a> {
    pub(crate) fn new(order: &BuildpackOrder, stores: &'a Stores) -> Self {
        let pending = order
            .groups()
            .iter()
            .map(|g| (0, g.clone()))
            .collect::<VecDeque<_>>();
        Self { stores, pending }
    }

    /// Substitute the meta member at `index` with each of its order's
    /// groups, queueing the variants ahead of every later candidate
    fn substitute(
        &mut self,
        depth: usize,
        group: &BuildpackGroup,
        index: usize,
        meta: &Buildpack,
        meta_order: &[BuildpackGroup],
    ) {
        for sub in meta_order.iter().rev() {
            let mut members = group.group[..index].to_vec();
            members.extend(sub.group.iter().map(|m| Buildpack {
                optional: m.optional || meta.optional,
                privileged: m.privileged || meta.privileged,
                ..m.clone()
            }));
            members.extend_from_slice(&group.group[index + 1..]);
            self.pending
                .push_front((depth + 1, BuildpackGroup::new(members)));
        }
    }
}

impl Iterator for GroupExpansion<'_> {
    type Item = Result<BuildpackGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        'groups: while let Some((depth, group)) = self.pending.pop_front() {
            for (i, bp) in group.group.iter().enumerate() {
                let descriptor = match self.stores.descriptor_for(bp) {
                    Ok(descriptor) => descriptor,
                    Err(e) => return Some(Err(e)),
                };
                if descriptor.is_meta() {
                    if depth >= MAX_EXPANSION_DEPTH {
                        return Some(Err(Error::buildpack(format!(
                            "buildpack order expansion exceeded depth {} at {}",
                            MAX_EXPANSION_DEPTH, bp
                        ))));
                    }
                    self.substitute(depth, &group, i, bp, &descriptor.order);
                    continue 'groups;
                }
            }
            match collapse(group) {
                Some(flat) => return Some(Ok(flat)),
                None => continue,
            }
        }
        None
    }
}

/// Collapse duplicate references inside a flat group
///
/// A repeated `(id, version)` keeps its first position; one id at two
/// versions invalidates the whole group.
fn collapse(group: BuildpackGroup) -> Option<BuildpackGroup> {
    let mut seen: Vec<(String, String)> = Vec::with_capacity(group.group.len());
    let mut members = Vec::with_capacity(group.group.len());

    for bp in group.group {
        if let Some((_, version)) = seen.iter().find(|(id, _)| *id == bp.id) {
            if *version == bp.version {
                continue;
            }
            return None;
        }
        seen.push((bp.id.clone(), bp.version.clone()));
        members.push(bp);
    }

    Some(BuildpackGroup::new(members))
}
