//! Instruction templates sent alongside the two video references.
//!
//! Every template shares one shape: video 1 is the structural/style input,
//! video 2 is the target, and the model must answer with a single-purpose
//! piece of text under explicit formatting constraints. They differ only in
//! framing. Callers can bypass them entirely with
//! [`crate::config::GenerationConfig::custom_instruction`].

use crate::config::InstructionTemplate;

/// Scene-by-scene narrative of how to turn video 1 into video 2 (default).
pub const SCENE_NARRATIVE_PROMPT: &str = "You are an expert Prompt Engineer for advanced video generation models. I have provided two videos:
1. **Input Structure (Video 1)**: The structural reference (sketch, wireframe, or raw footage).
2. **Target Output (Video 2)**: The final styled result (the 'ground truth').

**OBJECTIVE**: Write a comprehensive, detailed text prompt that describes exactly how to transform Video 1 into Video 2. The description should be vivid and precise.

**INSTRUCTIONS**:
1. **Narrative Flow**: Describe the video scene-by-scene in a chronological way (e.g., 'The video starts with...', 'Then...', 'Finally...').
2. **Visual Details**: Focus on the Art Style, Backgrounds, Lighting, and Textures in every scene.
3. **Character Consistency**: Please explicitly mention that character details should remain consistent.
4. **Audio**: Include a description of the audio and atmosphere.

**OUTPUT**:
Please provide the prompt text directly, followed by a brief summary of the Duration and Audio at the end.";

/// Transferable style only, no scene content.
pub const STYLE_ONLY_PROMPT: &str = "You are an expert Prompt Engineer for advanced video generation models. I have provided two videos:
1. **Style Reference (Video 1)**: The video whose look and feel must be reproduced.
2. **Target Content (Video 2)**: The video whose content should receive that look.

**OBJECTIVE**: Write a single text prompt that captures ONLY the visual style of Video 1 so it can be applied to Video 2.

**INSTRUCTIONS**:
1. Describe art style, color palette, lighting, texture, lens and camera language, and pacing.
2. Do NOT describe the subjects, story or events of either video.
3. Keep characters and layout of Video 2 unchanged; say so explicitly.

**OUTPUT**:
Output only the raw prompt text. No preamble, no headings, no explanations.";

/// List of the edits that turn video 1 into video 2.
pub const EDIT_LIST_PROMPT: &str = "You are an expert video editor. I have provided two videos:
1. **Source (Video 1)**: The original footage.
2. **Result (Video 2)**: The same footage after editing and restyling.

**OBJECTIVE**: Identify every edit applied to Video 1 to produce Video 2.

**INSTRUCTIONS**:
1. Cover color grading, stylisation, added or removed elements, timing and cuts, transitions, text overlays, and audio changes.
2. Order the edits as they appear in time.
3. Each edit is one imperative sentence that a video model could follow.

**OUTPUT**:
Output only the numbered list of edits. No preamble, no closing remarks.";

/// Text for a built-in template.
pub fn instruction_for(template: InstructionTemplate) -> &'static str {
    match template {
        InstructionTemplate::SceneNarrative => SCENE_NARRATIVE_PROMPT,
        InstructionTemplate::StyleOnly => STYLE_ONLY_PROMPT,
        InstructionTemplate::EditList => EDIT_LIST_PROMPT,
    }
}
