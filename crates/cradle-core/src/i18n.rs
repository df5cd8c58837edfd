//! Display label lookup.
//!
//! Core logic never branches on translated text; it only asks for labels.

/// Maps a label key to display text.
pub trait Translator {
    fn t(&self, key: &str) -> String;
}

impl<T: Translator + ?Sized> Translator for &T {
    fn t(&self, key: &str) -> String {
        (**self).t(key)
    }
}

/// Built-in English labels. Unknown keys are returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishTranslator;

impl Translator for EnglishTranslator {
    fn t(&self, key: &str) -> String {
        let text = match key {
            "weekday.mon" => "Mon",
            "weekday.tue" => "Tue",
            "weekday.wed" => "Wed",
            "weekday.thu" => "Thu",
            "weekday.fri" => "Fri",
            "weekday.sat" => "Sat",
            "weekday.sun" => "Sun",
            "tool.feeding" => "Feeding",
            "tool.breastfeeding" => "Breastfeeding",
            "tool.sleep" => "Sleep",
            "side.L" => "Left",
            "side.R" => "Right",
            "feed.formula" => "Formula",
            "feed.breast_milk" => "Breast milk",
            "feed.cow" => "Cow's milk",
            "feed.water" => "Water",
            _ => key,
        };
        text.to_string()
    }
}
