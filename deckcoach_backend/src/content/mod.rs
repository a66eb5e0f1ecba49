pub mod cache;
pub mod summarizer;

use crate::domain::SlideContent;

/// Render extracted slide text for a coaching prompt, marking the slide at
/// `current_index` (0-based position in `contents`).
pub fn format_for_prompt(contents: &[SlideContent], current_index: usize) -> String {
    let mut lines = Vec::with_capacity(contents.len() * 3 + 3);

    lines.push("=== PRESENTATION SLIDES CONTENT (extracted from slide images) ===".to_string());
    lines.push(format!("Current slide: Slide {}", current_index + 1));
    lines.push(String::new());

    for content in contents {
        let marker = if content.slide_number as usize == current_index + 1 {
            ">>> CURRENT SLIDE >>> "
        } else {
            ""
        };
        lines.push(format!("{}Slide {}: {}", marker, content.slide_number, content.title));
        if content.extracted_text.trim().is_empty() {
            lines.push("[No text extracted]".to_string());
        } else {
            lines.push(content.extracted_text.clone());
        }
        lines.push("---".to_string());
    }

    lines.push("=== END SLIDES CONTENT ===".to_string());
    lines.join("\n")
}

/// Extracted text for a catalog slide id, if any was produced.
pub fn text_for_slide(contents: &[SlideContent], slide_id: u32) -> Option<&str> {
    contents
        .iter()
        .find(|c| c.slide_id == slide_id)
        .map(|c| c.extracted_text.as_str())
        .filter(|text| !text.trim().is_empty())
}
