// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here. Data flow for one batch:
//
//   image features [b, F]            caption ids [b, L]
//         │                                │ (teacher forcing: drop last)
//         ▼                                ▼
//   ImageFeatureProjector [b,1,E]   WordSequenceEmbedder [b,L-1,E]
//         └──────────────┬─────────────────┘
//                        ▼
//               SequenceComposer [b, L, E]
//                        ▼
//      SequenceDecoder (GRU | LSTM, optionally bidirectional)
//                        ▼
//               logits [b, L, vocab]  ──→ MaskedObjective
//
//   extractor.rs — frozen image feature extractor seam
//   projector.rs, embedder.rs, composer.rs, decoder.rs
//                — the four graph stages
//   recurrent.rs — GRU / LSTM cells with variational dropout
//   objective.rs — padding-masked cross-entropy and accuracy
//   network.rs   — the stages wired into one Burn Module
//   unit.rs      — network + Adam + objective, bound once
//   model.rs     — ImageCaptioningModel facade (build once)
//   trainer.rs   — reference epoch loop
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vinyals et al. (2015) Show and Tell

pub mod composer;
pub mod decoder;
pub mod embedder;
pub mod extractor;
pub mod model;
pub mod network;
pub mod objective;
pub mod projector;
pub mod recurrent;
pub mod trainer;
pub mod unit;
