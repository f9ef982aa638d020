//! Viewer-scoped thread listings.
//!
//! A [`ThreadView`] is a snapshot of a board's thread roots taken under the
//! board's read lock. Trust is evaluated lazily, one root at a time, while the
//! view is iterated; later insertions are not reflected.

use crate::board::message::{IdentityId, Message};
use std::iter::FusedIterator;
use std::sync::Arc;

/// Decides whether a viewer wants to see content by an author.
pub trait TrustPolicy {
    fn accepts(&self, viewer: &IdentityId, author: &IdentityId) -> bool;
}

impl<F> TrustPolicy for F
where
    F: Fn(&IdentityId, &IdentityId) -> bool,
{
    fn accepts(&self, viewer: &IdentityId, author: &IdentityId) -> bool {
        self(viewer, author)
    }
}

/// Policy that accepts every author.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl TrustPolicy for AcceptAll {
    fn accepts(&self, _viewer: &IdentityId, _author: &IdentityId) -> bool {
        true
    }
}

/// Thread roots of one board as seen by one viewer, newest first.
pub struct ThreadView<'p, P: TrustPolicy + ?Sized> {
    viewer: IdentityId,
    roots: Arc<[Arc<Message>]>,
    policy: &'p P,
}

impl<'p, P: TrustPolicy + ?Sized> ThreadView<'p, P> {
    pub(crate) fn new(viewer: IdentityId, roots: Vec<Arc<Message>>, policy: &'p P) -> Self {
        Self {
            viewer,
            roots: roots.into(),
            policy,
        }
    }

    pub fn viewer(&self) -> &IdentityId {
        &self.viewer
    }

    /// Number of roots in the snapshot, before trust filtering.
    pub fn snapshot_len(&self) -> usize {
        self.roots.len()
    }

    /// Starts a fresh pass over the snapshot.
    pub fn iter(&self) -> ThreadViewIter<'_, P> {
        ThreadViewIter {
            viewer: &self.viewer,
            roots: &self.roots,
            policy: self.policy,
            position: 0,
        }
    }
}

impl<'p, P: TrustPolicy + ?Sized> Clone for ThreadView<'p, P> {
    fn clone(&self) -> Self {
        Self {
            viewer: self.viewer.clone(),
            roots: Arc::clone(&self.roots),
            policy: self.policy,
        }
    }
}

impl<'p, P: TrustPolicy + ?Sized> std::fmt::Debug for ThreadView<'p, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadView")
            .field("viewer", &self.viewer)
            .field("roots", &self.roots.len())
            .finish()
    }
}

impl<'a, 'p, P: TrustPolicy + ?Sized> IntoIterator for &'a ThreadView<'p, P> {
    type Item = &'a Arc<Message>;
    type IntoIter = ThreadViewIter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy, trust-filtered pass over a [`ThreadView`].
pub struct ThreadViewIter<'a, P: TrustPolicy + ?Sized> {
    viewer: &'a IdentityId,
    roots: &'a [Arc<Message>],
    policy: &'a P,
    position: usize,
}

impl<'a, P: TrustPolicy + ?Sized> Iterator for ThreadViewIter<'a, P> {
    type Item = &'a Arc<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(root) = self.roots.get(self.position) {
            self.position += 1;
            if self.policy.accepts(self.viewer, root.author()) {
                return Some(root);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.roots.len() - self.position))
    }
}

impl<'a, P: TrustPolicy + ?Sized> FusedIterator for ThreadViewIter<'a, P> {}
