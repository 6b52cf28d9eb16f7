//! # Classification orchestration
//!
//! Ties the pipeline, the oracle, the taxonomy, the meaning table and the
//! diagnostic encoder together for one request. Everything shared between
//! requests lives in an immutable [`ServiceContext`].

use std::time::Instant;

use rand::Rng;
use tracing::{debug, info};

use crate::classify::meanings::MeaningTable;
use crate::classify::oracle::ClassificationOracle;
use crate::classify::taxonomy::LabelTaxonomy;
use crate::encode::ResultEncoder;
use crate::error::{Error, Result};
use crate::preprocess::{preprocess, PipelineOptions};
use crate::tensor::BatchTensor;

/// Process-wide, read-only state built once at start-up.
pub struct ServiceContext {
    oracle: Box<dyn ClassificationOracle>,
    taxonomy: LabelTaxonomy,
    meanings: MeaningTable,
    encoder: ResultEncoder,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("outputs", &self.oracle.output_len())
            .field("taxonomy", &self.taxonomy)
            .field("meanings", &self.meanings.len())
            .field("encoder", &self.encoder)
            .finish()
    }
}

impl ServiceContext {
    /// Assembles the context, failing fast when the oracle and taxonomy
    /// disagree on size or, if the model embeds labels, on their order.
    pub fn new(
        oracle: Box<dyn ClassificationOracle>,
        taxonomy: LabelTaxonomy,
        meanings: MeaningTable,
        encoder: ResultEncoder,
    ) -> Result<Self> {
        taxonomy.ensure_matches(oracle.output_len())?;
        if let Some(embedded) = oracle.embedded_labels() {
            if embedded != taxonomy.labels() {
                return Err(Error::Manifest(format!(
                    "model labels {embedded:?} differ from taxonomy {:?}",
                    taxonomy.labels()
                )));
            }
        }
        Ok(ServiceContext { oracle, taxonomy, meanings, encoder })
    }

    pub fn oracle(&self) -> &dyn ClassificationOracle {
        self.oracle.as_ref()
    }

    pub fn taxonomy(&self) -> &LabelTaxonomy {
        &self.taxonomy
    }

    pub fn meanings(&self) -> &MeaningTable {
        &self.meanings
    }

    pub fn encoder(&self) -> &ResultEncoder {
        &self.encoder
    }
}

/// Label decision derived from one oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
    pub meaning: String,
}

/// Everything returned to the caller for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub predicted_label: String,
    pub confidence: f32,
    pub meaning: String,
    /// Base64 JPEG of the preprocessed pixels.
    pub diagnostic_image: String,
    /// Whether augmentation mirrored the input.
    pub flipped: bool,
}

/// Index and value of the largest score; ties go to the lowest index.
pub fn select_best(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Runs the oracle on `batch` and turns its scores into a [`Prediction`].
pub fn classify(ctx: &ServiceContext, batch: &BatchTensor) -> Result<Prediction> {
    let scores = ctx.oracle.predict(batch)?;
    ctx.taxonomy.ensure_matches(scores.len())?;

    if let Some(bad) = scores.iter().find(|v| !v.is_finite()) {
        return Err(Error::Oracle(format!("oracle returned non-finite score {bad}")));
    }
    let (index, confidence) =
        select_best(&scores).ok_or_else(|| Error::Oracle("oracle returned no scores".into()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(Error::Oracle(format!("confidence {confidence} is outside [0, 1]")));
    }

    let label = ctx
        .taxonomy
        .get(index)
        .ok_or(Error::TaxonomyMismatch { expected: ctx.taxonomy.len(), actual: scores.len() })?
        .to_string();
    let meaning = ctx.meanings.lookup(&label).to_string();
    debug!(index, %label, confidence, "oracle decision");
    Ok(Prediction { index, label, confidence, meaning })
}

/// Full request flow: preprocess → classify → encode the diagnostic image.
pub fn classify_image<R: Rng + ?Sized>(
    ctx: &ServiceContext,
    image: &[u8],
    options: PipelineOptions,
    rng: &mut R,
) -> Result<ClassificationResult> {
    let start = Instant::now();
    let pre = preprocess(image, options, rng)?;
    let prediction = classify(ctx, &pre.batch)?;
    let diagnostic_image = ctx.encoder.encode(&pre.image)?;

    info!(
        label = %prediction.label,
        confidence = prediction.confidence,
        augment = options.augment,
        to_grayscale = options.to_grayscale,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "classified image"
    );
    Ok(ClassificationResult {
        predicted_label: prediction.label,
        confidence: prediction.confidence,
        meaning: prediction.meaning,
        diagnostic_image,
        flipped: pre.flipped,
    })
}
