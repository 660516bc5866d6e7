use crate::commands::{read, repair, tour};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "tour",
            groups: tour::EXAMPLES,
        },
        CommandExample {
            name: "feed",
            groups: read::FEED_EXAMPLES,
        },
        CommandExample {
            name: "notifications",
            groups: read::NOTIFICATION_EXAMPLES,
        },
        CommandExample {
            name: "rebuild-feed",
            groups: repair::REBUILD_EXAMPLES,
        },
        CommandExample {
            name: "repair-likes",
            groups: repair::LIKE_EXAMPLES,
        },
    ]
}
