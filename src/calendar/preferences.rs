use std::collections::BTreeSet;

use serde::Serialize;

use super::models::{DisplayItem, EventColor};

/// A named label the calendar shows for each palette color.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Etiquette {
    pub id: &'static str,
    pub name: &'static str,
    pub color: EventColor,
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

pub const ETIQUETTES: [Etiquette; 5] = [
    Etiquette {
        id: "classes",
        name: "Classes",
        color: EventColor::Blue,
        is_active: true,
    },
    Etiquette {
        id: "assignments",
        name: "Assignments",
        color: EventColor::Orange,
        is_active: true,
    },
    Etiquette {
        id: "exams",
        name: "Exams",
        color: EventColor::Violet,
        is_active: true,
    },
    Etiquette {
        id: "study",
        name: "Study Sessions",
        color: EventColor::Emerald,
        is_active: true,
    },
    Etiquette {
        id: "holidays",
        name: "Holidays",
        color: EventColor::Rose,
        is_active: true,
    },
];

/// Which colors the calendar currently shows. Owned by whoever renders
/// the calendar and passed in explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewPreferences {
    visible_colors: BTreeSet<EventColor>,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            visible_colors: ETIQUETTES
                .iter()
                .filter(|e| e.is_active)
                .map(|e| e.color)
                .collect(),
        }
    }
}

impl ViewPreferences {
    /// Start from the defaults with `hidden` colors turned off.
    pub fn hiding(hidden: impl IntoIterator<Item = EventColor>) -> Self {
        let mut prefs = Self::default();
        for color in hidden {
            prefs.visible_colors.remove(&color);
        }
        prefs
    }

    pub fn toggle(&mut self, color: EventColor) {
        if !self.visible_colors.remove(&color) {
            self.visible_colors.insert(color);
        }
    }

    /// Items without a color are always visible.
    pub fn is_visible(&self, color: Option<EventColor>) -> bool {
        match color {
            Some(c) => self.visible_colors.contains(&c),
            None => true,
        }
    }

    pub fn visible_colors(&self) -> impl Iterator<Item = &EventColor> {
        self.visible_colors.iter()
    }

    pub fn filter(&self, items: Vec<DisplayItem>) -> Vec<DisplayItem> {
        items
            .into_iter()
            .filter(|item| self.is_visible(item.color))
            .collect()
    }
}
