//! TF-IDF text vectorizer
//!
//! Tokens are runs of two or more word characters, lowercased, with English
//! stop words dropped. IDF is smoothed (`ln((1 + n) / (1 + df)) + 1`) so a
//! term present in every document still carries weight, and every document
//! vector is L2-normalized, which makes a dot product a cosine similarity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "do", "done", "down", "due",
    "during", "each", "eg", "either", "else", "elsewhere", "enough", "etc", "even", "ever",
    "every", "everyone", "everything", "everywhere", "except", "few", "for", "former",
    "formerly", "from", "further", "had", "has", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "ie", "if", "in", "indeed", "into", "is", "it", "its", "itself", "last",
    "latter", "latterly", "least", "less", "ltd", "made", "many", "may", "me", "meanwhile",
    "might", "more", "moreover", "most", "mostly", "much", "must", "my", "myself", "namely",
    "neither", "never", "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "per", "perhaps", "please", "rather", "re", "same", "seem", "seemed", "seeming", "seems",
    "several", "she", "should", "since", "so", "some", "somehow", "someone", "something",
    "sometime", "sometimes", "somewhere", "still", "such", "than", "that", "the", "their",
    "them", "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
    "therein", "thereupon", "these", "they", "this", "those", "though", "through",
    "throughout", "thru", "thus", "to", "together", "too", "toward", "towards", "under",
    "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Split text into lowercase, stop-word-free tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Fitted vocabulary and inverse document frequencies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term -> column, columns in alphabetical term order
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

/// Sparse L2-normalized document vector: (column, weight) sorted by column
pub type SparseVector = Vec<(usize, f64)>;

impl TfidfVectorizer {
    /// Learn vocabulary and IDF from a corpus
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let terms: BTreeSet<&str> = tokenized.iter().flatten().map(String::as_str).collect();
        let vocabulary: BTreeMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                df[vocabulary[term]] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&i| self.idf[i])
    }

    /// Vectorize one document against the fitted vocabulary
    ///
    /// Unknown terms are ignored; a document with no known terms is the zero vector.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(document) {
            if let Some(&col) = self.vocabulary.get(&token) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col]))
            .collect();

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        }
        vector
    }
}

/// Dot product of two column-sorted sparse vectors
pub fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}
