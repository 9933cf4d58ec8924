//! Single-binary CLI for the orchestration bus (spec §6: "a single entry
//! point per run mode"): `dashboard`, `acp-bus`, `orchestrator run "<task>"`.

pub mod acp_bus;
pub mod llm;
pub mod orchestrator;
