// Shared prompt fragments. Each pipeline that calls the model keeps its own
// prompts.rs alongside it; only cross-cutting fragments live here.

/// Instruction that forbids invented details.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Use only information present in the provided sources. \
    Do NOT invent companies, titles, locations or URLs. \
    If a field is not present in the sources, omit its line entirely.";
