//! Concurrency tests for the board registry.
//!
//! Several threads insert cross-posted messages into a shared registry. The
//! final state must match a sequential insertion, and no message may be
//! inserted twice.

use boardweave::board::{
    BoardName, BoardRegistry, IdentityId, Message, MessageDraft, ParentLink, ThreadLinks,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 4;

fn boards() -> Vec<BoardName> {
    ["alpha", "beta", "gamma"]
        .iter()
        .map(|n| BoardName::new(*n).unwrap())
        .collect()
}

/// Builds a forest where every message is posted to all boards, listed in a
/// random order per message.
fn cross_posted_forest(rng: &mut StdRng, size: usize) -> Vec<Message> {
    let author = IdentityId::new("alice").unwrap();
    let mut messages: Vec<Message> = Vec::with_capacity(size);
    for i in 0..size {
        let mut names = boards();
        names.shuffle(rng);
        let mut draft = MessageDraft::new(author.clone())
            .boards(names)
            .body(format!("message {}", i))
            .created_at(i as u64);
        if i > 0 && rng.gen_bool(0.8) {
            draft = draft.reply_to(&messages[rng.gen_range(0..i)]);
        }
        messages.push(draft.build().unwrap());
    }
    messages
}

#[test]
fn test_parallel_cross_posts_settle() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut messages = cross_posted_forest(&mut rng, 200);
    messages.shuffle(&mut rng);

    let registry = Arc::new(BoardRegistry::in_memory());
    let barrier = Arc::new(Barrier::new(THREADS));
    let chunks: Vec<Vec<Message>> = messages
        .chunks(messages.len().div_ceil(THREADS))
        .map(|c| c.to_vec())
        .collect();

    let handles: Vec<_> = chunks
        .into_iter()
        .map(|chunk| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for message in chunk {
                    registry.insert(message).expect("insert should succeed");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    for name in boards() {
        let board = registry.board(&name).expect("board created on insert");
        assert_eq!(board.message_count(), messages.len());
        assert!(board.absolute_orphans().is_empty());
        for message in &messages {
            let links = board.links_of(&message.uri()).unwrap();
            if message.is_thread_root() {
                assert_eq!(links, ThreadLinks::default());
            } else {
                assert_eq!(
                    links.parent,
                    message.declared_parent_uri().map(ParentLink::declared)
                );
                assert_eq!(links.thread, message.declared_thread_uri());
            }
        }
    }
}

#[test]
fn test_racing_duplicates_insert_once() {
    let registry = Arc::new(BoardRegistry::in_memory());
    let message = MessageDraft::new(IdentityId::new("alice").unwrap())
        .boards(boards())
        .body("contested")
        .build()
        .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS * 2));
    let accepted = Arc::new(AtomicUsize::new(0));
    let duplicates = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS * 2)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let accepted = Arc::clone(&accepted);
            let duplicates = Arc::clone(&duplicates);
            let message = message.clone();
            thread::spawn(move || {
                barrier.wait();
                match registry.insert(message) {
                    Ok(_) => accepted.fetch_add(1, Ordering::SeqCst),
                    Err(e) if e.is_duplicate() => duplicates.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("unexpected error: {}", e),
                };
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert_eq!(duplicates.load(Ordering::SeqCst), THREADS * 2 - 1);
    for board in registry.boards() {
        assert_eq!(board.message_count(), 1);
    }
}

/// Readers never observe a reply linked to a parent the board lacks.
#[test]
fn test_readers_see_consistent_links() {
    let mut rng = StdRng::seed_from_u64(11);
    let messages = cross_posted_forest(&mut rng, 120);
    let registry = Arc::new(BoardRegistry::in_memory());
    let name = BoardName::new("alpha").unwrap();
    let alpha = registry.create_board(&name).unwrap();

    let writer = {
        let registry = Arc::clone(&registry);
        let messages = messages.clone();
        thread::spawn(move || {
            for message in messages.into_iter().rev() {
                registry.insert(message).expect("insert should succeed");
            }
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let alpha = Arc::clone(&alpha);
            let messages = messages.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    for message in &messages {
                        let Some(links) = alpha.links_of(&message.uri()) else {
                            continue;
                        };
                        if let Some(parent) = links.parent_uri() {
                            assert!(alpha.contains(&parent));
                        }
                    }
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert_eq!(alpha.message_count(), messages.len());
}
