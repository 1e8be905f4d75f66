//! Entity fixtures shared by unit tests.

use std::collections::BTreeMap;

use crate::entity::{Entity, EntityHeader};
use crate::enum_field;
use crate::field::{EnumField, Slot};
use crate::schema::Schema;

macro_rules! slots {
    ($($name:literal => $field:ident),* $(,)?) => {
        fn header(&self) -> &EntityHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }

        fn field(&self, name: &str) -> Option<&dyn Slot> {
            match name {
                $($name => Some(&self.$field),)*
                _ => None,
            }
        }

        fn field_mut(&mut self, name: &str) -> Option<&mut dyn Slot> {
            match name {
                $($name => Some(&mut self.$field),)*
                _ => None,
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Shade {
    Dark,
    Light,
}

impl EnumField for Shade {
    fn name(&self) -> &'static str {
        match self {
            Shade::Dark => "Dark",
            Shade::Light => "Light",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Dark" => Some(Shade::Dark),
            "Light" => Some(Shade::Light),
            _ => None,
        }
    }
}

enum_field!(Shade);

#[derive(Debug, Clone, Default)]
pub(crate) struct Part {
    pub header: EntityHeader,
    pub code: String,
    pub qty: i32,
}

impl Part {
    pub fn new(code: &str, qty: i32) -> Self {
        Self {
            code: code.to_string(),
            qty,
            ..Self::default()
        }
    }
}

impl Entity for Part {
    fn schema() -> Schema {
        Schema::new("Part").key::<String>("code").field::<i32>("qty")
    }

    slots!("code" => code, "qty" => qty);
}

#[derive(Debug, Default)]
pub(crate) struct Owner {
    pub header: EntityHeader,
    pub name: String,
    pub main: Option<Part>,
    pub linked: Option<Part>,
    pub plain: Option<Part>,
    pub parts: Vec<Part>,
    pub labels: BTreeMap<String, Option<String>>,
}

impl Owner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Owner {
    fn schema() -> Schema {
        Schema::new("Owner")
            .key::<String>("name")
            .full_save::<Option<Part>>("main")
            .reference::<Option<Part>>("linked")
            .field::<Option<Part>>("plain")
            .full_save::<Vec<Part>>("parts")
            .field::<BTreeMap<String, Option<String>>>("labels")
    }

    slots!(
        "name" => name,
        "main" => main,
        "linked" => linked,
        "plain" => plain,
        "parts" => parts,
        "labels" => labels,
    );
}

#[derive(Debug, Default)]
pub(crate) struct Tagged {
    pub header: EntityHeader,
    pub label: String,
    pub part: Part,
}

impl Tagged {
    pub fn new(label: &str, part: Part) -> Self {
        Self {
            label: label.to_string(),
            part,
            ..Self::default()
        }
    }
}

impl Entity for Tagged {
    fn schema() -> Schema {
        Schema::new("Tagged").key::<String>("label").key::<Part>("part")
    }

    slots!("label" => label, "part" => part);
}

#[derive(Debug, Default)]
pub(crate) struct Loose {
    pub header: EntityHeader,
    pub name: String,
}

impl Entity for Loose {
    fn schema() -> Schema {
        Schema::new("Loose")
            .ignore_unknown_properties()
            .key::<String>("name")
    }

    slots!("name" => name);
}

/// Shallow container: never stored itself, only its parts are.
#[derive(Debug, Default)]
pub(crate) struct Bundle {
    pub header: EntityHeader,
    pub parts: Vec<Part>,
}

impl Entity for Bundle {
    fn schema() -> Schema {
        Schema::new("Bundle").shallow().full_save::<Vec<Part>>("parts")
    }

    slots!("parts" => parts);
}

/// Entity without identity fields.
#[derive(Debug, Default)]
pub(crate) struct Note {
    pub header: EntityHeader,
    pub text: String,
    pub shade: Option<Shade>,
}

impl Note {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Note {
    fn schema() -> Schema {
        Schema::new("Note")
            .ignore_null()
            .field::<String>("text")
            .indexed::<Option<Shade>>("shade")
    }

    slots!("text" => text, "shade" => shade);
}
