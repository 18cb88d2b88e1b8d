//! Help topics shown by `/help`.

pub const WELCOME: &str = "\
Welcome to room-chat!
Type a line and press enter to talk to everyone in the room.
Lines starting with / are commands; /help lists the help topics.
";

const TOPICS: &str = "\
1. what this app does
2. flags
3. commands";

const ABOUT: &str = "\
room-chat is a group chat where every participant is an equal peer.
Messages are published to a room topic and every member of the room
receives them. Some commands (/fetch, /to, /who, /iam) can be sent to
other peers, who run them and answer you directly.";

const FLAGS: &str = "\
--nick <name>     nickname shown to others (default $USER-<short id>)
--room <name>     room to join at startup (default akumuji)
--relay <url>     relay to connect to (default ws://127.0.0.1:8919)
--config <file>   TOML config file
-d, --debug       verbose logging";

const COMMANDS: &str = "\
/to <peer|all> <text>   send text to one peer, or to everyone
/fetch <addr>           look addr up and answer with a json payload
/who                    ask everyone to introduce themselves
/iam                    introduce yourself
/in <peer>              make a peer /fetch something for you
/peers                  list peers in this room
/join <room>            switch room
/home                   go back to the room you started in
/help [topic], /h       this help
/quit, /q               leave";

/// Text for a help topic. Unknown topics get a pointer to the index.
pub fn get_help(topic: &str) -> &'static str {
    match topic.trim() {
        "0" => WELCOME,
        "" => TOPICS,
        "1" | "about" => ABOUT,
        "2" | "flags" => FLAGS,
        "3" | "commands" => COMMANDS,
        _ => "no such help topic, try /help",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_lists_topics() {
        assert!(get_help("").starts_with("1. what this app does\n2. flags"));
    }

    #[test]
    fn test_topics_by_number_and_name() {
        assert_eq!(get_help("2"), get_help("flags"));
        assert_eq!(get_help(" 3 "), COMMANDS);
        assert_eq!(get_help("0"), WELCOME);
        assert_eq!(get_help("nope"), "no such help topic, try /help");
    }
}
