//! Style-specific prompt enhancement applied just before a prompt reaches the gateway.

const CLOTHING_GUARD: &str = "clothed, wearing clothes, no nudity, appropriate content";

fn image_style_clause(style: &str) -> Option<&'static str> {
    let clause = match style {
        "photorealistic" => "ultra high resolution, photorealistic, cinematic lighting, 8K quality",
        "fantasy" => "fantasy art, magical atmosphere, detailed, vibrant colors",
        "anime" => "anime style, vibrant colors, detailed characters",
        "linear" => {
            "semi-realistic digital illustration, strong anime/manga influence, detailed character art, professional digital painting, anime-inspired aesthetic"
        }
        "art-linear-x" => {
            "semi-realistic digital illustration with strong anime and manga influence, detailed character art style, professional digital painting with clean lines and smooth shading, vibrant colors, anime-inspired aesthetic, high quality digital art with soft lighting and elegant composition"
        }
        "concept" => "concept art, professional, detailed, digital art",
        _ => return None,
    };
    Some(clause)
}

fn gif_style_sentence(style: &str) -> Option<&'static str> {
    let sentence = match style {
        "photorealistic" => "Ultra realistic animation, smooth motion, cinematic quality.",
        "fantasy" => "Fantasy art style, magical movement effects, vibrant animated colors.",
        "anime" => "Anime style animation, expressive movements, dynamic action.",
        "concept" => "Concept art style, professional animation, detailed movement.",
        _ => return None,
    };
    Some(sentence)
}

pub fn enhance_image_prompt(prompt: &str, style: &str) -> String {
    let mut enhanced = format!("{prompt}, {CLOTHING_GUARD}");
    if let Some(clause) = image_style_clause(style.trim()) {
        enhanced.push_str(", ");
        enhanced.push_str(clause);
    }
    enhanced
}

pub fn enhance_gif_prompt(prompt: &str, style: &str) -> String {
    let mut enhanced = format!(
        "Create an animated GIF with realistic movements: {prompt}. \
Add subtle, natural motion like breathing, hair moving, slight body sway, or environmental movement. \
Ensure all subjects are clothed and wearing appropriate clothing, no nudity."
    );
    if let Some(sentence) = gif_style_sentence(style.trim()) {
        enhanced.push(' ');
        enhanced.push_str(sentence);
    }
    enhanced
}

/// `index` is zero-based.
pub fn frame_prompt(enhanced: &str, index: usize) -> String {
    format!("{enhanced} Frame {} of animated sequence.", index + 1)
}
