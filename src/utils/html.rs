use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Question stems and explanations may carry light formatting (<b>, <i>, <sub>
/// for lab values), which is kept; scripts, iframes and event-handler
/// attributes are removed before the text is stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
