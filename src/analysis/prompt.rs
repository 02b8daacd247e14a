use super::AnalysisHints;

const INTRO: &str = r#"Analyze this image and return the following information as JSON:

1. hashtags: five representative hashtags for the image
"#;

const CAMERA_SECTION: &str = r#"2. camera_settings: the camera settings this shot was most likely taken with
   - shutter_speed: shutter speed (e.g. "1/125")
   - iso: ISO value (e.g. 400)
   - aperture: aperture (e.g. "f/2.8")
   - reasoning: why you estimated these settings
"#;

const LOCATION_SECTION: &str = r#"3. location: where the photo was most likely taken
   - primary_location: short "(city) (place)" form (e.g. "Seoul Namsan Tower", "Paris Eiffel Tower")
   - alternative_locations: other plausible places (array, same form)
"#;

const SHAPE: &str = r#"
Reply with JSON only, in exactly this shape:
{
    "hashtags": ["tag1", "tag2", "tag3", "tag4", "tag5"],
    "camera_settings": {
        "shutter_speed": "estimate",
        "iso": 400,
        "aperture": "estimate",
        "reasoning": "why"
    },
    "location": {
        "primary_location": "(city) (place)",
        "alternative_locations": ["(city) (place)", "(city) (place)"]
    }
}

Always give locations in the short "(city/region) (specific place)" form.
"#;

/// Build the prompt, asking only for what the photo does not already embed
pub fn build_prompt(hints: AnalysisHints) -> String {
    let mut prompt = String::from(INTRO);
    if !hints.has_embedded_camera {
        prompt.push_str(CAMERA_SECTION);
    }
    if !hints.has_embedded_location {
        prompt.push_str(LOCATION_SECTION);
    }
    prompt.push_str(SHAPE);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asks_for_everything_without_metadata() {
        let prompt = build_prompt(AnalysisHints::default());
        assert!(prompt.contains("1. hashtags"));
        assert!(prompt.contains("2. camera_settings"));
        assert!(prompt.contains("3. location"));
    }

    #[test]
    fn test_skips_embedded_sections() {
        let prompt = build_prompt(AnalysisHints {
            has_embedded_camera: true,
            has_embedded_location: false,
        });
        assert!(!prompt.contains("2. camera_settings"));
        assert!(prompt.contains("3. location"));

        let prompt = build_prompt(AnalysisHints {
            has_embedded_camera: false,
            has_embedded_location: true,
        });
        assert!(prompt.contains("2. camera_settings"));
        assert!(!prompt.contains("3. location"));
    }
}
