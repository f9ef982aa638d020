//! Property tests for order independence.
//!
//! Random reply forests are inserted in random orders, with random subsets of
//! messages missing. Whatever the order, every member must end up with the
//! links determined by which of its references are present.

use boardweave::board::{
    Board, BoardName, IdentityId, Message, MessageDraft, MessageUri, ParentLink, ThreadLinks,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

const BOARD: &str = "prop";

/// Builds `size` messages where each reply answers a random earlier message.
fn random_forest(rng: &mut StdRng, size: usize) -> Vec<Message> {
    let authors: Vec<IdentityId> = ["alice", "bob", "carol", "dave"]
        .iter()
        .map(|a| IdentityId::new(*a).unwrap())
        .collect();
    let board = BoardName::new(BOARD).unwrap();
    let mut messages: Vec<Message> = Vec::with_capacity(size);

    for i in 0..size {
        let author = authors.choose(rng).unwrap().clone();
        let mut draft = MessageDraft::new(author)
            .board(board.clone())
            .title(format!("message {}", i))
            .created_at(rng.gen_range(1..1_000_000));
        if i > 0 && rng.gen_bool(0.75) {
            let parent = &messages[rng.gen_range(0..i)];
            draft = draft.reply_to(parent);
        }
        messages.push(draft.build().unwrap());
    }
    messages
}

/// Links a member must have given which URIs are present on the board.
fn expected_links(message: &Message, present: &HashSet<MessageUri>) -> ThreadLinks {
    if message.is_thread_root() {
        return ThreadLinks::default();
    }
    let thread = message
        .declared_thread_uri()
        .filter(|t| present.contains(t));
    let parent = match message.declared_parent_uri() {
        Some(p) if present.contains(&p) => Some(ParentLink::declared(p)),
        _ => thread.map(ParentLink::provisional),
    };
    ThreadLinks {
        parent,
        thread,
        parent_refused: false,
    }
}

fn assert_expected(board: &Board, inserted: &[Message]) {
    let present: HashSet<MessageUri> = inserted.iter().map(|m| m.uri()).collect();
    let mut orphans = 0;
    for message in inserted {
        let expected = expected_links(message, &present);
        if expected.is_unresolved() && !message.is_thread_root() {
            orphans += 1;
        }
        assert_eq!(
            board.links_of(&message.uri()),
            Some(expected),
            "links of {} diverged",
            message.uri().short()
        );
    }
    assert_eq!(board.absolute_orphans().len(), orphans);
    assert_eq!(
        board.thread_count(),
        inserted.iter().filter(|m| m.is_thread_root()).count()
    );
}

/// Property: a complete forest settles on declared links in any order.
#[test]
fn property_complete_forest_any_order() {
    for seed in 0..40 {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = rng.gen_range(1..40);
        let mut messages = random_forest(&mut rng, size);
        messages.shuffle(&mut rng);

        let board = Board::create(BOARD).unwrap();
        for message in &messages {
            board.insert(message.clone()).unwrap();
        }
        assert_expected(&board, &messages);
        assert!(board.absolute_orphans().is_empty(), "seed {}", seed);
    }
}

/// Property: with messages missing, links depend only on what is present.
#[test]
fn property_partial_forest_any_order() {
    for seed in 100..160 {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = rng.gen_range(2..50);
        let mut messages = random_forest(&mut rng, size);
        messages.retain(|_| rng.gen_bool(0.6));
        messages.shuffle(&mut rng);

        let board = Board::create(BOARD).unwrap();
        for message in &messages {
            board.insert(message.clone()).unwrap();
        }
        assert_expected(&board, &messages);
    }
}

/// Property: rebuilding a board reproduces the incremental links.
#[test]
fn property_rebuild_matches_incremental() {
    for seed in 200..230 {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = rng.gen_range(2..40);
        let mut messages = random_forest(&mut rng, size);
        messages.retain(|_| rng.gen_bool(0.7));
        messages.shuffle(&mut rng);

        let board = Board::create(BOARD).unwrap();
        for message in &messages {
            board.insert(message.clone()).unwrap();
        }
        let report = board.rebuild().unwrap();
        assert_eq!(report.members, messages.len());
        assert_eq!(report.refused_parents, 0);
        assert_expected(&board, &messages);
    }
}

/// Property: every prefix of an insertion order is itself in the expected
/// state, so intermediate states never expose stale links.
#[test]
fn property_every_prefix_consistent() {
    for seed in 300..310 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut messages = random_forest(&mut rng, 25);
        messages.shuffle(&mut rng);

        let board = Board::create(BOARD).unwrap();
        for (i, message) in messages.iter().enumerate() {
            board.insert(message.clone()).unwrap();
            assert_expected(&board, &messages[..=i]);
        }
    }
}
