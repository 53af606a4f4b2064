//! Weather condition codes.
//!
//! Codes follow the OpenWeatherMap numbering: the hundreds digit selects the
//! group (2xx thunderstorm, 5xx rain, 800 clear, ...) and the remaining digits
//! the specific condition.

/// Short description of a provider condition code.
pub fn condition_description(code: i32) -> &'static str {
    match code {
        200..=232 => "Storm",
        300..=321 => "Drizzle",
        500 => "Light Rain",
        501 => "Moderate Rain",
        502 => "Heavy Rain",
        503 => "Intense Rain",
        504 => "Extreme Rain",
        511 => "Freezing Rain",
        520 => "Light Shower",
        521 => "Shower",
        522 => "Heavy Shower",
        531 => "Ragged Shower",
        600 => "Light Snow",
        601 => "Snow",
        602 => "Heavy Snow",
        611..=613 => "Sleet",
        615 | 616 => "Rain and Snow",
        620..=622 => "Snow Shower",
        701 => "Mist",
        711 => "Smoke",
        721 => "Haze",
        731 => "Sand, Dust Whirls",
        741 => "Fog",
        751 => "Sand",
        761 => "Dust",
        762 => "Volcanic Ash",
        771 => "Squalls",
        781 | 900 => "Tornado",
        800 => "Clear",
        801 => "Mostly Clear",
        802 => "Scattered Clouds",
        803 => "Broken Clouds",
        804 => "Overcast Clouds",
        901 => "Tropical Storm",
        902 => "Hurricane",
        903 => "Cold",
        904 => "Hot",
        905 => "Windy",
        906 => "Hail",
        951..=962 => "Breeze",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(condition_description(800), "Clear");
        assert_eq!(condition_description(502), "Heavy Rain");
        assert_eq!(condition_description(221), "Storm");
        assert_eq!(condition_description(-1), "Unknown");
    }
}
