//! Authors a flip in memory, publishes it against a stub node and decodes
//! the payload the node would have stored.
//!
//! Run with `cargo run --example publish_flip`.

use flip_ceremony::{
    decode_flip, encode_data_url, publish_flip, random_keyword_pair, Flip, FlipFilter, FlipStore,
    FlipSubmitter, FlipType, MemoryFlipStore, Permutation, SubmitResponse,
};
use serde_json::json;

/// Stand-in for the node RPC: accepts every flip and keeps the last payload.
#[derive(Default)]
struct StubNode {
    last: Option<(String, String)>,
}

impl FlipSubmitter for StubNode {
    fn submit_flip(
        &mut self,
        public_hex: &str,
        private_hex: &str,
        keyword_pair_id: u32,
    ) -> SubmitResponse {
        println!(
            "node received pair {keyword_pair_id}: public {} chars, private {} chars",
            public_hex.len(),
            private_hex.len()
        );
        self.last = Some((public_hex.to_string(), private_hex.to_string()));
        SubmitResponse::ok(json!({ "hash": "0x5eed", "txHash": "0x01" }))
    }
}

fn main() {
    let pair = random_keyword_pair();
    println!("keyword pair words: {:?}", pair.words);

    let mut flip = Flip::draft("demo", pair.id, 1_700_000_000);
    for (idx, slot) in flip.images.iter_mut().enumerate() {
        *slot = Some(encode_data_url("image/png", &[idx as u8; 32]));
    }
    flip.order_permutations = "3,1,0,2".parse::<Permutation>().unwrap();
    flip.order = flip.order_permutations;

    let mut store = MemoryFlipStore::new(vec![flip]);
    let mut node = StubNode::default();
    match publish_flip(&mut store, &mut node, "demo") {
        Ok(result) => println!("published: {result}"),
        Err(err) => {
            eprintln!("publish failed: {err}");
            std::process::exit(1);
        }
    }

    let flips = store.get_flips().unwrap();
    for flip in FlipFilter::Active.apply(&flips) {
        assert_eq!(flip.flip_type, FlipType::Publishing);
        println!("{} -> {:?} ({})", flip.id, flip.hash, flip.flip_type);
    }

    if let Some((public, private)) = node.last {
        let decoded = decode_flip(&public, &private).unwrap();
        println!("orders: {} / {}", decoded.orders[0], decoded.orders[1]);
        if let Some(story) = decoded.arrange(0) {
            let firsts: Vec<u8> = story.iter().map(|img| img[0]).collect();
            println!("images under order 0: {firsts:?}");
        }
    }
}
