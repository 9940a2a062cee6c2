#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use finrag::chunking::Chunk;
use finrag::{ChatModel, Embedder, RAGError, Result};

pub const DIM: usize = 256;

/// Bag-of-words hashing embedder. Identical text gives identical vectors.
pub struct HashEmbedder {
    name: String,
    fail_on: Option<String>,
}

impl HashEmbedder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_on: None,
        }
    }

    /// Fails any batch that contains a text with `marker` in it.
    pub fn failing_on(name: &str, marker: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_on: Some(marker.to_string()),
        }
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

pub fn hash_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for word in text.split_whitespace() {
        let word = word.to_lowercase();
        v[(fnv1a(&word) % DIM as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    } else {
        v[0] = 1.0;
    }
    v
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed_documents(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if let Some(marker) = &self.fail_on {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(RAGError::Embedding(format!("provider rejected {marker}")));
            }
        }
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }
}

/// Records every prompt and answers with a canned reply.
pub struct StubChat {
    pub prompts: Rc<RefCell<Vec<String>>>,
    reply: std::result::Result<String, String>,
}

impl StubChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            prompts: Rc::new(RefCell::new(Vec::new())),
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            prompts: Rc::new(RefCell::new(Vec::new())),
            reply: Err(message.to_string()),
        }
    }
}

impl ChatModel for StubChat {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.reply.clone().map_err(RAGError::Generation)
    }
}

pub fn chunk(id: &str, content: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        source: format!("data/processed/{}.txt", id),
        content: content.to_string(),
    }
}

/// Five chunks with disjoint vocabularies.
pub fn sample_chunks() -> Vec<Chunk> {
    vec![
        chunk("a_0", "Acme Corp reported Total Revenue of 1000000 USD on 2023-12-31."),
        chunk("b_0", "Globex Inc reported NetIncomeLoss of -42 USD on 2022-06-30."),
        chunk("c_0", "Initech LLC reported Assets of 77 EUR on 2021-03-31."),
        chunk("d_0", "Umbrella plc reported Liabilities of 900 GBP on 2020-09-30."),
        chunk("e_0", "Hooli Ltd reported Cash of 12 JPY on 2019-01-31."),
    ]
}
