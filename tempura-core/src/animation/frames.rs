//! ASCII art for each [`Condition`], five lines tall, thirteen columns wide.

use crate::model::Condition;

pub type Frame = &'static [&'static str];

pub const FRAME_HEIGHT: usize = 5;

const CLEAR_DAY: &[Frame] = &[
    &[
        "    \\   /    ",
        "     .-.     ",
        "  ‒ (   ) ‒  ",
        "     `-'     ",
        "    /   \\    ",
    ],
    &[
        "      |      ",
        "  \\  .-.  /  ",
        " ―  (   )  ― ",
        "  /  `-'  \\  ",
        "      |      ",
    ],
];

const CLEAR_NIGHT: &[Frame] = &[
    &[
        "    *        ",
        "      .-.    ",
        "     (   )   ",
        "      `-'    ",
        "  *       *  ",
    ],
    &[
        "    +        ",
        "      .-.  * ",
        "     (   )   ",
        "      `-'    ",
        "  .       +  ",
    ],
    &[
        "    .        ",
        "      .-.  + ",
        "  *  (   )   ",
        "      `-'    ",
        "  +       .  ",
    ],
];

const PARTLY_CLOUDY: &[Frame] = &[
    &[
        "   \\  /      ",
        " _ /\"\".-.    ",
        "   \\_(   ).  ",
        "   /(___(__) ",
        "             ",
    ],
    &[
        "   \\  /      ",
        " _ /\"\" .-.   ",
        "   \\_ (   ). ",
        "   / (___(__)",
        "             ",
    ],
    &[
        "   \\  /      ",
        " _ /\"\".-.    ",
        "   \\_(   ).  ",
        "   /(___(__) ",
        "             ",
    ],
];

const CLOUDY: &[Frame] = &[
    &[
        "             ",
        "     .--.    ",
        "  .-(    ).  ",
        " (___.__)__) ",
        "             ",
    ],
    &[
        "             ",
        "    .--.     ",
        "  -(    ).   ",
        " (___.__)__) ",
        "             ",
    ],
    &[
        "             ",
        "     .--.    ",
        "  .-(    ).  ",
        " (___.__)__) ",
        "             ",
    ],
];

const RAIN: &[Frame] = &[
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        " ‚ʻ‚ʻ‚ʻ‚ʻ    ",
        " ‚ʻ‚ʻ‚ʻ‚ʻ    ",
    ],
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        "  ‚ʻ‚ʻ‚ʻ‚ʻ   ",
        "  ‚ʻ‚ʻ‚ʻ‚ʻ   ",
    ],
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        "   ‚ʻ‚ʻ‚ʻ‚ʻ  ",
        " ‚ʻ‚ʻ‚ʻ‚ʻ    ",
    ],
];

const THUNDERSTORM: &[Frame] = &[
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        "   ⚡ʻ‚ʻ‚ʻ   ",
        "  ‚ʻ⚡ʻ‚ʻ    ",
    ],
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        "  ‚ʻ‚ʻ⚡ʻ    ",
        "   ⚡ʻ‚ʻ‚ʻ   ",
    ],
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        " ‚ʻ‚ʻ‚ʻ‚ʻ    ",
        " ‚ʻ‚ʻ‚ʻ‚ʻ    ",
    ],
];

const SNOW: &[Frame] = &[
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        "   *  *  *   ",
        "  *  *  *    ",
    ],
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        "  *  *  *    ",
        "   *  *  *   ",
    ],
    &[
        "     .-.     ",
        "  .-(   ).   ",
        " (___.__)__) ",
        " *  *  *     ",
        "  *  *  *    ",
    ],
];

const MIST: &[Frame] = &[
    &[
        "             ",
        " ≡ ≡ ≡ ≡ ≡   ",
        "  ≡ ≡ ≡ ≡    ",
        " ≡ ≡ ≡ ≡ ≡   ",
        "  ≡ ≡ ≡ ≡    ",
    ],
    &[
        "             ",
        "  ≡ ≡ ≡ ≡    ",
        " ≡ ≡ ≡ ≡ ≡   ",
        "  ≡ ≡ ≡ ≡    ",
        " ≡ ≡ ≡ ≡ ≡   ",
    ],
];

/// The looping frame sequence for `condition`. Never empty.
pub fn frames(condition: Condition) -> &'static [Frame] {
    match condition {
        Condition::ClearDay => CLEAR_DAY,
        Condition::ClearNight => CLEAR_NIGHT,
        Condition::PartlyCloudy => PARTLY_CLOUDY,
        Condition::Cloudy => CLOUDY,
        Condition::Rain => RAIN,
        Condition::Thunderstorm => THUNDERSTORM,
        Condition::Snow => SNOW,
        Condition::Mist => MIST,
    }
}

/// First frame, used when animation is off.
pub fn still(condition: Condition) -> Frame {
    frames(condition)[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_condition_has_uniform_frames() {
        for &condition in Condition::all() {
            let sequence = frames(condition);
            assert!(!sequence.is_empty(), "{condition:?} has no frames");
            for frame in sequence {
                assert_eq!(frame.len(), FRAME_HEIGHT, "{condition:?}");
            }
        }
    }

    #[test]
    fn still_is_the_first_frame() {
        assert_eq!(still(Condition::Rain), frames(Condition::Rain)[0]);
    }
}
