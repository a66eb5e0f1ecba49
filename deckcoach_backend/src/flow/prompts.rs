use crate::content::text_for_slide;
use crate::domain::{CustomerProfile, Slide, SlideContent};

pub const FLOW_INSTRUCTION: &str = "Generate the optimized presentation flow for this customer.";
pub const TALKING_POINTS_INSTRUCTION: &str =
    "Generate the key talking points for each slide in this presentation.";

fn slide_text<'a>(contents: &'a [SlideContent], slide_id: u32) -> &'a str {
    text_for_slide(contents, slide_id).unwrap_or("No content")
}

pub fn flow_system_prompt(
    profile: &CustomerProfile,
    slides: &[Slide],
    contents: &[SlideContent],
) -> String {
    let summary = slides
        .iter()
        .map(|slide| {
            format!(
                "Slide {} ({}):\n{}\n---",
                slide.id,
                slide.title,
                slide_text(contents, slide.id)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let ids = slides
        .iter()
        .map(|s| s.id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an expert presentation strategist for cloud migration sales. Your task is to analyze the customer's situation and reorder presentation slides to maximize impact and relevance.

Customer Profile:
{profile}

Available Slides (with extracted content):
{summary}

Your task:
1. Analyze the customer's needs, urgency, audience type, and pain points
2. Review all slide content to understand what each slide covers
3. Create an optimized presentation flow that:
   - Starts with slides that address their immediate pain points
   - Matches their urgency level (urgent = cost/timeline focus first, exploring = vision/strategy first)
   - Aligns with their modernization appetite (conservative = low-risk approach, aggressive = innovation focus)
   - Suits their audience (technical = architecture details, business = ROI/business value, mixed = both)
   - Builds a logical narrative that leads to the solution

Return ONLY a valid JSON object with this exact structure (no markdown, no code blocks):
{{
  "orderedSlideIds": [{first_ids}],
  "reasoning": "Brief explanation of the flow strategy for this customer"
}}

The orderedSlideIds array must contain ALL of these slide IDs exactly once: {ids}."#,
        profile = profile.prompt_block(),
        summary = summary,
        first_ids = slides
            .iter()
            .take(3)
            .map(|s| s.id.to_string())
            .chain(std::iter::once("...".to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        ids = ids,
    )
}

pub fn talking_points_system_prompt(
    profile: &CustomerProfile,
    ordered: &[Slide],
    contents: &[SlideContent],
) -> String {
    let summary = ordered
        .iter()
        .enumerate()
        .map(|(idx, slide)| {
            format!(
                "{}. Slide {} - {}:\n{}\n---",
                idx + 1,
                slide.id,
                slide.title,
                slide_text(contents, slide.id)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are an expert sales coach for cloud migration presentations. Generate the 1-2 most important talking points for each slide in this customized presentation.

Customer Profile:
{profile}

Presentation Flow (in the customized order for this customer):
{summary}

For each slide, provide:
1. The ONE most critical message to convey (keyMessage1)
2. A powerful supporting point or call-to-action (keyMessage2)

These should be:
- Concise (1-2 sentences each)
- Tailored to this specific customer's context
- Focused on value and outcomes
- Actionable and memorable

Return ONLY a valid JSON object with this structure (no markdown, no code blocks):
{{
  "talkingPoints": [
    {{
      "slideId": 8,
      "slideTitle": "Slide Title",
      "keyMessage1": "Primary message",
      "keyMessage2": "Supporting point"
    }}
  ]
}}"#,
        profile = profile.prompt_block(),
        summary = summary,
    )
}
