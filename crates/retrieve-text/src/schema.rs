use anyhow::Result;
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER: &str = "text_with_stopwords";

#[derive(Debug, Clone, Copy)]
pub struct Fields {
    pub id: Field,
    pub content: Field,
    pub owner_kind: Field,
    pub move_type: Field,
    pub document_id: Field,
    pub source: Field,
    pub metadata: Field,
}

impl Fields {
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: schema.get_field("id")?,
            content: schema.get_field("content")?,
            owner_kind: schema.get_field("owner_kind")?,
            move_type: schema.get_field("move_type")?,
            document_id: schema.get_field("document_id")?,
            source: schema.get_field("source")?,
            metadata: schema.get_field("metadata")?,
        })
    }
}

pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("id", STRING | STORED);
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    builder.add_text_field("content", TextOptions::default().set_indexing_options(indexing).set_stored());
    builder.add_text_field("owner_kind", STRING | STORED);
    builder.add_text_field("move_type", STRING | STORED);
    builder.add_text_field("document_id", STRING | STORED);
    builder.add_text_field("source", STRING | STORED);
    builder.add_text_field("metadata", STORED);
    builder.build()
}

/// Lowercasing tokenizer with an English stopword list.
pub fn register_tokenizer(index: &Index) {
    let stop_words = [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of",
        "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them",
        "their", "there", "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom",
        "whose", "can", "could", "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have",
        "had", "having",
    ];
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.iter().map(|s| s.to_string())))
        .build();
    index.tokenizers().register(TOKENIZER, tokenizer);
}
