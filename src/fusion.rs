//! Lexical + BERT feature fusion.
//!
//! The BERT component (probabilities or embeddings) is converted to sparse
//! storage and appended after the lexical columns. Train and test are fused
//! independently; their lexical parts must come from the same fitted
//! extractor so that columns mean the same thing in both.

use crate::bert::BertOutput;
use crate::error::{Result, TextClfError};
use crate::matrix::FeatureMatrix;

/// Append the BERT features of `bert` to `lexical`, row by row.
pub fn fuse(lexical: &FeatureMatrix, bert: &BertOutput) -> Result<FeatureMatrix> {
    let dense = bert.features();
    if dense.n_rows() != lexical.n_rows() {
        return Err(TextClfError::invalid_argument(format!(
            "lexical features have {} rows but BERT features have {}",
            lexical.n_rows(),
            dense.n_rows()
        )));
    }
    lexical.to_sparse().horizontal_concat(&dense.to_sparse())
}

/// Fuse the train and test splits.
pub fn fuse_splits(
    lexical_train: &FeatureMatrix,
    bert_train: &BertOutput,
    lexical_test: &FeatureMatrix,
    bert_test: &BertOutput,
) -> Result<(FeatureMatrix, FeatureMatrix)> {
    let train = fuse(lexical_train, bert_train)?;
    let test = fuse(lexical_test, bert_test)?;
    log::debug!(
        "fused features: train {:?}, test {:?}",
        train.shape(),
        test.shape()
    );
    Ok((train, test))
}
