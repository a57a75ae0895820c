//! Face-embedding identity matching against a known gallery.
//!
//! The detector (external, out of scope) turns an image into one embedding
//! per detected face. This module owns the gallery of known embeddings,
//! the accept/reject decision, and registration/removal. Matching is a
//! linear scan — fine for tens to low hundreds of identities; a larger
//! deployment would want an indexed nearest-neighbour structure.

use crate::collaborators::{BlobStore, EmployeeDirectory};
use crate::config::FaceMatchConfig;
use crate::error::{ReceptionError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Embeddings extracted from one submitted image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceObservation {
    /// One embedding per detected face, in detector order.
    pub embeddings: Vec<Vec<f32>>,
}

impl FaceObservation {
    /// Observation with a single face.
    #[must_use]
    pub fn single(embedding: Vec<f32>) -> Self {
        Self {
            embeddings: vec![embedding],
        }
    }

    /// The embedding used for matching: the first face the detector
    /// returned. Detector order, not "largest" or "most central".
    #[must_use]
    pub fn primary(&self) -> Option<&[f32]> {
        self.embeddings.first().map(Vec::as_slice)
    }
}

/// One known identity in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    /// Employee this embedding belongs to.
    pub employee_id: String,
    /// The enrolled embedding.
    pub embedding: Vec<f32>,
}

/// The append-only collection of known face embeddings.
///
/// Persisted as a single JSON blob; mutations rewrite the whole document
/// so readers never observe a partial state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaceGallery {
    /// Enrolled identities.
    pub entries: Vec<GalleryEntry>,
}

impl FaceGallery {
    /// Decode a gallery from its persisted blob.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::Gallery`] when the blob is not a valid
    /// gallery document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ReceptionError::Gallery(format!("invalid gallery document: {e}")))
    }

    /// Encode the gallery for persistence.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::Gallery`] when encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| ReceptionError::Gallery(format!("cannot encode gallery: {e}")))
    }

    /// Whether an identity has an enrolled embedding.
    #[must_use]
    pub fn contains(&self, employee_id: &str) -> bool {
        self.entries.iter().any(|e| e.employee_id == employee_id)
    }
}

/// Outcome of an identification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The closest gallery entry was accepted.
    Recognized {
        /// Matched identity.
        employee_id: String,
        /// Display name from the directory, or a placeholder when the
        /// directory was unreachable.
        display_name: String,
        /// Distance to the matched entry.
        distance: f32,
    },
    /// No gallery entry was close enough (or the gallery is empty).
    /// Callers fall back to manual verification.
    NotRecognized,
    /// Two identities were too close to call. Callers fall back to
    /// manual verification rather than guessing.
    Ambiguous {
        /// Distance to the best entry.
        distance: f32,
        /// Distance to the runner-up.
        runner_up: f32,
    },
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Embedding enrolled; total gallery size afterwards.
    Registered {
        /// Entries in the gallery after the append.
        total: usize,
    },
    /// The identity already has an entry. Remove it explicitly first —
    /// there is no silent overwrite.
    AlreadyRegistered,
}

/// Outcome of a removal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The entry was removed.
    Removed,
    /// No entry existed for the identity.
    NotFound,
}

/// Internal decision on a gallery scan, before name enrichment.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanDecision {
    Accept { index: usize, distance: f32 },
    Ambiguous { distance: f32, runner_up: f32 },
    Reject,
}

/// The face match engine: gallery storage + decision procedure.
pub struct FaceMatchEngine {
    store: Arc<dyn BlobStore>,
    directory: Arc<dyn EmployeeDirectory>,
    config: FaceMatchConfig,
}

impl FaceMatchEngine {
    /// Create an engine over a gallery blob store and the directory used
    /// for display-name enrichment.
    #[must_use]
    pub fn new(
        store: Arc<dyn BlobStore>,
        directory: Arc<dyn EmployeeDirectory>,
        config: FaceMatchConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// Identify the face in `observation` against the gallery.
    ///
    /// # Errors
    ///
    /// - [`ReceptionError::NoFaceDetected`] when the observation holds no
    ///   embedding — an input problem, not an identity-absence result.
    /// - [`ReceptionError::Gallery`] when the gallery blob cannot be read
    ///   or decoded — never conflated with "no match".
    pub async fn identify(&self, observation: &FaceObservation) -> Result<MatchOutcome> {
        let Some(embedding) = observation.primary() else {
            return Err(ReceptionError::NoFaceDetected);
        };
        if observation.embeddings.len() > 1 {
            info!(
                faces = observation.embeddings.len(),
                "multiple faces detected, using the first"
            );
        }

        let gallery = self.load_gallery().await?;
        match scan(&gallery, embedding, &self.config) {
            ScanDecision::Reject => Ok(MatchOutcome::NotRecognized),
            ScanDecision::Ambiguous {
                distance,
                runner_up,
            } => {
                warn!(distance, runner_up, "ambiguous face match rejected");
                Ok(MatchOutcome::Ambiguous {
                    distance,
                    runner_up,
                })
            }
            ScanDecision::Accept { index, distance } => {
                let employee_id = gallery.entries[index].employee_id.clone();
                let display_name = self.display_name(&employee_id).await;
                info!(%employee_id, distance, "face recognized");
                Ok(MatchOutcome::Recognized {
                    employee_id,
                    display_name,
                    distance,
                })
            }
        }
    }

    /// Enroll a new identity.
    ///
    /// Requires exactly one detectable face in the observation. Warns, but
    /// does not reject, when the new embedding is suspiciously close to a
    /// different identity.
    ///
    /// # Errors
    ///
    /// - [`ReceptionError::NoFaceDetected`] for an empty observation.
    /// - [`ReceptionError::Registration`] when several faces are present.
    /// - [`ReceptionError::Gallery`] on storage failures.
    pub async fn register(
        &self,
        employee_id: &str,
        observation: &FaceObservation,
    ) -> Result<RegistrationOutcome> {
        let embedding = match observation.embeddings.as_slice() {
            [] => return Err(ReceptionError::NoFaceDetected),
            [one] => one.clone(),
            many => {
                return Err(ReceptionError::Registration(format!(
                    "expected exactly one face, detected {}",
                    many.len()
                )));
            }
        };

        let mut gallery = self.load_gallery().await?;
        if gallery.contains(employee_id) {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        if let Some((neighbor, distance)) = closest_entry(&gallery, &embedding) {
            if distance < self.config.duplicate_warn_distance {
                warn!(
                    %employee_id,
                    neighbor = %gallery.entries[neighbor].employee_id,
                    distance,
                    "new embedding is close to an existing identity"
                );
            }
        }

        gallery.entries.push(GalleryEntry {
            employee_id: employee_id.to_owned(),
            embedding,
        });
        self.persist_gallery(&gallery).await?;
        info!(%employee_id, total = gallery.entries.len(), "face registered");
        Ok(RegistrationOutcome::Registered {
            total: gallery.entries.len(),
        })
    }

    /// Remove an identity's entry.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::Gallery`] on storage failures.
    pub async fn remove(&self, employee_id: &str) -> Result<RemovalOutcome> {
        let mut gallery = self.load_gallery().await?;
        let before = gallery.entries.len();
        gallery.entries.retain(|e| e.employee_id != employee_id);
        if gallery.entries.len() == before {
            return Ok(RemovalOutcome::NotFound);
        }
        self.persist_gallery(&gallery).await?;
        info!(%employee_id, "face registration removed");
        Ok(RemovalOutcome::Removed)
    }

    /// Whether an identity is enrolled.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::Gallery`] on storage failures.
    pub async fn is_registered(&self, employee_id: &str) -> Result<bool> {
        Ok(self.load_gallery().await?.contains(employee_id))
    }

    /// Load the gallery; a missing blob is an empty gallery, a failed
    /// read or decode is an error.
    async fn load_gallery(&self) -> Result<FaceGallery> {
        let blob = self
            .store
            .read()
            .await
            .map_err(|e| ReceptionError::Gallery(format!("gallery read failed: {e}")))?;
        match blob {
            Some(bytes) => FaceGallery::from_bytes(&bytes),
            None => Ok(FaceGallery::default()),
        }
    }

    /// Read-modify-write of the full gallery document.
    async fn persist_gallery(&self, gallery: &FaceGallery) -> Result<()> {
        let bytes = gallery.to_bytes()?;
        self.store
            .write(&bytes)
            .await
            .map_err(|e| ReceptionError::Gallery(format!("gallery write failed: {e}")))
    }

    /// Resolve a display name, falling back to a placeholder when the
    /// directory is unreachable or has no record. Name enrichment is
    /// decoupled from the identity match itself.
    async fn display_name(&self, employee_id: &str) -> String {
        match self.directory.lookup_by_id(employee_id).await {
            Ok(Some(record)) => record.name.unwrap_or_else(|| employee_id.to_owned()),
            Ok(None) => employee_id.to_owned(),
            Err(e) => {
                warn!(%employee_id, "directory lookup failed during recognition: {e}");
                employee_id.to_owned()
            }
        }
    }
}

/// Scan the gallery and decide accept/ambiguous/reject.
fn scan(gallery: &FaceGallery, embedding: &[f32], config: &FaceMatchConfig) -> ScanDecision {
    let Some((best_index, best)) = closest_entry(gallery, embedding) else {
        return ScanDecision::Reject;
    };

    if best > config.match_threshold {
        return ScanDecision::Reject;
    }

    // With a single entry there is nothing to be ambiguous against.
    let runner_up = gallery
        .entries
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best_index)
        .map(|(_, e)| euclidean_distance(embedding, &e.embedding))
        .fold(None::<f32>, |acc, d| {
            Some(acc.map_or(d, |a| a.min(d)))
        });

    if let Some(runner_up) = runner_up {
        let gap = runner_up - best;
        if gap < config.ambiguity_margin && best > config.strong_match_threshold {
            return ScanDecision::Ambiguous {
                distance: best,
                runner_up,
            };
        }
    }

    ScanDecision::Accept {
        index: best_index,
        distance: best,
    }
}

fn closest_entry(gallery: &FaceGallery, embedding: &[f32]) -> Option<(usize, f32)> {
    gallery
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| (i, euclidean_distance(embedding, &e.embedding)))
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

/// Euclidean distance between two embeddings.
///
/// Mismatched lengths compare only the shared prefix; the detector always
/// produces fixed-length vectors, so this is a guard, not a feature.
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
