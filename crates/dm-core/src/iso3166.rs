//! ISO-3166-1 country codes
//!
//! A static table of country records used to normalize region identifiers to
//! their alpha-3 form. The table is extended with `EL` (Greece) and `UK`
//! (United Kingdom) as used by EU standards.

use thiserror::Error;

/// Errors from code normalization
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Unknown ISO-3166 alpha-2 code: {0}")]
    UnknownAlpha2(String),

    #[error("Unknown ISO-3166 numeric code: {0}")]
    UnknownNumeric(String),

    /// Names and malformed codes are not looked up
    #[error("Unsupported country identifier: {0:?}")]
    Unsupported(String),
}

/// One country record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    pub name: &'static str,
    pub alpha2: &'static str,
    pub alpha3: &'static str,
    pub numeric: &'static str,
}

impl Country {
    const fn new(
        name: &'static str,
        alpha2: &'static str,
        alpha3: &'static str,
        numeric: &'static str,
    ) -> Self {
        Self {
            name,
            alpha2,
            alpha3,
            numeric,
        }
    }
}

/// Normalize a country identifier to its alpha-3 code.
///
/// Three uppercase letters are returned unchanged, two uppercase letters are
/// looked up as alpha-2 and three digits as a numeric code. Lookup by
/// country name is not supported.
pub fn iso3166(id: &str) -> Result<String, LookupError> {
    let is_upper = |s: &str| s.bytes().all(|b| b.is_ascii_uppercase());

    if id.len() == 3 && is_upper(id) {
        return Ok(id.to_string());
    }

    if id.len() == 2 && is_upper(id) {
        return by_alpha2(id)
            .map(|c| c.alpha3.to_string())
            .ok_or_else(|| LookupError::UnknownAlpha2(id.to_string()));
    }

    if id.len() == 3 && id.bytes().all(|b| b.is_ascii_digit()) {
        return by_numeric(id)
            .map(|c| c.alpha3.to_string())
            .ok_or_else(|| LookupError::UnknownNumeric(id.to_string()));
    }

    Err(LookupError::Unsupported(id.to_string()))
}

pub fn by_alpha2(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.alpha2 == code)
}

pub fn by_alpha3(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.alpha3 == code)
}

pub fn by_numeric(code: &str) -> Option<&'static Country> {
    COUNTRIES.iter().find(|c| c.numeric == code)
}

/// All known country records
pub fn countries() -> &'static [Country] {
    COUNTRIES
}

static COUNTRIES: &[Country] = &[
    Country::new("Afghanistan", "AF", "AFG", "004"),
    Country::new("Åland Islands", "AX", "ALA", "248"),
    Country::new("Albania", "AL", "ALB", "008"),
    Country::new("Algeria", "DZ", "DZA", "012"),
    Country::new("American Samoa", "AS", "ASM", "016"),
    Country::new("Andorra", "AD", "AND", "020"),
    Country::new("Angola", "AO", "AGO", "024"),
    Country::new("Anguilla", "AI", "AIA", "660"),
    Country::new("Antarctica", "AQ", "ATA", "010"),
    Country::new("Antigua and Barbuda", "AG", "ATG", "028"),
    Country::new("Argentina", "AR", "ARG", "032"),
    Country::new("Armenia", "AM", "ARM", "051"),
    Country::new("Aruba", "AW", "ABW", "533"),
    Country::new("Australia", "AU", "AUS", "036"),
    Country::new("Austria", "AT", "AUT", "040"),
    Country::new("Azerbaijan", "AZ", "AZE", "031"),
    Country::new("Bahamas", "BS", "BHS", "044"),
    Country::new("Bahrain", "BH", "BHR", "048"),
    Country::new("Bangladesh", "BD", "BGD", "050"),
    Country::new("Barbados", "BB", "BRB", "052"),
    Country::new("Belarus", "BY", "BLR", "112"),
    Country::new("Belgium", "BE", "BEL", "056"),
    Country::new("Belize", "BZ", "BLZ", "084"),
    Country::new("Benin", "BJ", "BEN", "204"),
    Country::new("Bermuda", "BM", "BMU", "060"),
    Country::new("Bhutan", "BT", "BTN", "064"),
    Country::new("Bolivia (Plurinational State of)", "BO", "BOL", "068"),
    Country::new("Bonaire, Sint Eustatius and Saba", "BQ", "BES", "535"),
    Country::new("Bosnia and Herzegovina", "BA", "BIH", "070"),
    Country::new("Botswana", "BW", "BWA", "072"),
    Country::new("Bouvet Island", "BV", "BVT", "074"),
    Country::new("Brazil", "BR", "BRA", "076"),
    Country::new("British Indian Ocean Territory", "IO", "IOT", "086"),
    Country::new("Brunei Darussalam", "BN", "BRN", "096"),
    Country::new("Bulgaria", "BG", "BGR", "100"),
    Country::new("Burkina Faso", "BF", "BFA", "854"),
    Country::new("Burundi", "BI", "BDI", "108"),
    Country::new("Cabo Verde", "CV", "CPV", "132"),
    Country::new("Cambodia", "KH", "KHM", "116"),
    Country::new("Cameroon", "CM", "CMR", "120"),
    Country::new("Canada", "CA", "CAN", "124"),
    Country::new("Cayman Islands", "KY", "CYM", "136"),
    Country::new("Central African Republic", "CF", "CAF", "140"),
    Country::new("Chad", "TD", "TCD", "148"),
    Country::new("Chile", "CL", "CHL", "152"),
    Country::new("China", "CN", "CHN", "156"),
    Country::new("Christmas Island", "CX", "CXR", "162"),
    Country::new("Cocos (Keeling) Islands", "CC", "CCK", "166"),
    Country::new("Colombia", "CO", "COL", "170"),
    Country::new("Comoros", "KM", "COM", "174"),
    Country::new("Congo", "CG", "COG", "178"),
    Country::new("Congo (Democratic Republic of the)", "CD", "COD", "180"),
    Country::new("Cook Islands", "CK", "COK", "184"),
    Country::new("Costa Rica", "CR", "CRI", "188"),
    Country::new("Côte d'Ivoire", "CI", "CIV", "384"),
    Country::new("Croatia", "HR", "HRV", "191"),
    Country::new("Cuba", "CU", "CUB", "192"),
    Country::new("Curaçao", "CW", "CUW", "531"),
    Country::new("Cyprus", "CY", "CYP", "196"),
    Country::new("Czech Republic", "CZ", "CZE", "203"),
    Country::new("Denmark", "DK", "DNK", "208"),
    Country::new("Djibouti", "DJ", "DJI", "262"),
    Country::new("Dominica", "DM", "DMA", "212"),
    Country::new("Dominican Republic", "DO", "DOM", "214"),
    Country::new("Ecuador", "EC", "ECU", "218"),
    Country::new("Egypt", "EG", "EGY", "818"),
    Country::new("El Salvador", "SV", "SLV", "222"),
    Country::new("Equatorial Guinea", "GQ", "GNQ", "226"),
    Country::new("Eritrea", "ER", "ERI", "232"),
    Country::new("Estonia", "EE", "EST", "233"),
    Country::new("Ethiopia", "ET", "ETH", "231"),
    Country::new("Falkland Islands (Malvinas)", "FK", "FLK", "238"),
    Country::new("Faroe Islands", "FO", "FRO", "234"),
    Country::new("Fiji", "FJ", "FJI", "242"),
    Country::new("Finland", "FI", "FIN", "246"),
    Country::new("France", "FR", "FRA", "250"),
    Country::new("French Guiana", "GF", "GUF", "254"),
    Country::new("French Polynesia", "PF", "PYF", "258"),
    Country::new("French Southern Territories", "TF", "ATF", "260"),
    Country::new("Gabon", "GA", "GAB", "266"),
    Country::new("Gambia", "GM", "GMB", "270"),
    Country::new("Georgia", "GE", "GEO", "268"),
    Country::new("Germany", "DE", "DEU", "276"),
    Country::new("Ghana", "GH", "GHA", "288"),
    Country::new("Gibraltar", "GI", "GIB", "292"),
    Country::new("Greece", "GR", "GRC", "300"),
    Country::new("Greece", "EL", "GRC", "300"),
    Country::new("Greenland", "GL", "GRL", "304"),
    Country::new("Grenada", "GD", "GRD", "308"),
    Country::new("Guadeloupe", "GP", "GLP", "312"),
    Country::new("Guam", "GU", "GUM", "316"),
    Country::new("Guatemala", "GT", "GTM", "320"),
    Country::new("Guernsey", "GG", "GGY", "831"),
    Country::new("Guinea", "GN", "GIN", "324"),
    Country::new("Guinea-Bissau", "GW", "GNB", "624"),
    Country::new("Guyana", "GY", "GUY", "328"),
    Country::new("Haiti", "HT", "HTI", "332"),
    Country::new("Heard Island and McDonald Islands", "HM", "HMD", "334"),
    Country::new("Holy See", "VA", "VAT", "336"),
    Country::new("Honduras", "HN", "HND", "340"),
    Country::new("Hong Kong", "HK", "HKG", "344"),
    Country::new("Hungary", "HU", "HUN", "348"),
    Country::new("Iceland", "IS", "ISL", "352"),
    Country::new("India", "IN", "IND", "356"),
    Country::new("Indonesia", "ID", "IDN", "360"),
    Country::new("Iran (Islamic Republic of)", "IR", "IRN", "364"),
    Country::new("Iraq", "IQ", "IRQ", "368"),
    Country::new("Ireland", "IE", "IRL", "372"),
    Country::new("Isle of Man", "IM", "IMN", "833"),
    Country::new("Israel", "IL", "ISR", "376"),
    Country::new("Italy", "IT", "ITA", "380"),
    Country::new("Jamaica", "JM", "JAM", "388"),
    Country::new("Japan", "JP", "JPN", "392"),
    Country::new("Jersey", "JE", "JEY", "832"),
    Country::new("Jordan", "JO", "JOR", "400"),
    Country::new("Kazakhstan", "KZ", "KAZ", "398"),
    Country::new("Kenya", "KE", "KEN", "404"),
    Country::new("Kiribati", "KI", "KIR", "296"),
    Country::new("Korea (Democratic People's Republic of)", "KP", "PRK", "408"),
    Country::new("Korea (Republic of)", "KR", "KOR", "410"),
    Country::new("Kuwait", "KW", "KWT", "414"),
    Country::new("Kyrgyzstan", "KG", "KGZ", "417"),
    Country::new("Lao People's Democratic Republic", "LA", "LAO", "418"),
    Country::new("Latvia", "LV", "LVA", "428"),
    Country::new("Lebanon", "LB", "LBN", "422"),
    Country::new("Lesotho", "LS", "LSO", "426"),
    Country::new("Liberia", "LR", "LBR", "430"),
    Country::new("Libya", "LY", "LBY", "434"),
    Country::new("Liechtenstein", "LI", "LIE", "438"),
    Country::new("Lithuania", "LT", "LTU", "440"),
    Country::new("Luxembourg", "LU", "LUX", "442"),
    Country::new("Macao", "MO", "MAC", "446"),
    Country::new("Macedonia (the former Yugoslav Republic of)", "MK", "MKD", "807"),
    Country::new("Madagascar", "MG", "MDG", "450"),
    Country::new("Malawi", "MW", "MWI", "454"),
    Country::new("Malaysia", "MY", "MYS", "458"),
    Country::new("Maldives", "MV", "MDV", "462"),
    Country::new("Mali", "ML", "MLI", "466"),
    Country::new("Malta", "MT", "MLT", "470"),
    Country::new("Marshall Islands", "MH", "MHL", "584"),
    Country::new("Martinique", "MQ", "MTQ", "474"),
    Country::new("Mauritania", "MR", "MRT", "478"),
    Country::new("Mauritius", "MU", "MUS", "480"),
    Country::new("Mayotte", "YT", "MYT", "175"),
    Country::new("Mexico", "MX", "MEX", "484"),
    Country::new("Micronesia (Federated States of)", "FM", "FSM", "583"),
    Country::new("Moldova (Republic of)", "MD", "MDA", "498"),
    Country::new("Monaco", "MC", "MCO", "492"),
    Country::new("Mongolia", "MN", "MNG", "496"),
    Country::new("Montenegro", "ME", "MNE", "499"),
    Country::new("Montserrat", "MS", "MSR", "500"),
    Country::new("Morocco", "MA", "MAR", "504"),
    Country::new("Mozambique", "MZ", "MOZ", "508"),
    Country::new("Myanmar", "MM", "MMR", "104"),
    Country::new("Namibia", "NA", "NAM", "516"),
    Country::new("Nauru", "NR", "NRU", "520"),
    Country::new("Nepal", "NP", "NPL", "524"),
    Country::new("Netherlands", "NL", "NLD", "528"),
    Country::new("New Caledonia", "NC", "NCL", "540"),
    Country::new("New Zealand", "NZ", "NZL", "554"),
    Country::new("Nicaragua", "NI", "NIC", "558"),
    Country::new("Niger", "NE", "NER", "562"),
    Country::new("Nigeria", "NG", "NGA", "566"),
    Country::new("Niue", "NU", "NIU", "570"),
    Country::new("Norfolk Island", "NF", "NFK", "574"),
    Country::new("Northern Mariana Islands", "MP", "MNP", "580"),
    Country::new("Norway", "NO", "NOR", "578"),
    Country::new("Oman", "OM", "OMN", "512"),
    Country::new("Pakistan", "PK", "PAK", "586"),
    Country::new("Palau", "PW", "PLW", "585"),
    Country::new("Palestine, State of", "PS", "PSE", "275"),
    Country::new("Panama", "PA", "PAN", "591"),
    Country::new("Papua New Guinea", "PG", "PNG", "598"),
    Country::new("Paraguay", "PY", "PRY", "600"),
    Country::new("Peru", "PE", "PER", "604"),
    Country::new("Philippines", "PH", "PHL", "608"),
    Country::new("Pitcairn", "PN", "PCN", "612"),
    Country::new("Poland", "PL", "POL", "616"),
    Country::new("Portugal", "PT", "PRT", "620"),
    Country::new("Puerto Rico", "PR", "PRI", "630"),
    Country::new("Qatar", "QA", "QAT", "634"),
    Country::new("Réunion", "RE", "REU", "638"),
    Country::new("Romania", "RO", "ROU", "642"),
    Country::new("Russian Federation", "RU", "RUS", "643"),
    Country::new("Rwanda", "RW", "RWA", "646"),
    Country::new("Saint Barthélemy", "BL", "BLM", "652"),
    Country::new("Saint Helena, Ascension and Tristan da Cunha", "SH", "SHN", "654"),
    Country::new("Saint Kitts and Nevis", "KN", "KNA", "659"),
    Country::new("Saint Lucia", "LC", "LCA", "662"),
    Country::new("Saint Martin (French part)", "MF", "MAF", "663"),
    Country::new("Saint Pierre and Miquelon", "PM", "SPM", "666"),
    Country::new("Saint Vincent and the Grenadines", "VC", "VCT", "670"),
    Country::new("Samoa", "WS", "WSM", "882"),
    Country::new("San Marino", "SM", "SMR", "674"),
    Country::new("Sao Tome and Principe", "ST", "STP", "678"),
    Country::new("Saudi Arabia", "SA", "SAU", "682"),
    Country::new("Senegal", "SN", "SEN", "686"),
    Country::new("Serbia", "RS", "SRB", "688"),
    Country::new("Seychelles", "SC", "SYC", "690"),
    Country::new("Sierra Leone", "SL", "SLE", "694"),
    Country::new("Singapore", "SG", "SGP", "702"),
    Country::new("Sint Maarten (Dutch part)", "SX", "SXM", "534"),
    Country::new("Slovakia", "SK", "SVK", "703"),
    Country::new("Slovenia", "SI", "SVN", "705"),
    Country::new("Solomon Islands", "SB", "SLB", "090"),
    Country::new("Somalia", "SO", "SOM", "706"),
    Country::new("South Africa", "ZA", "ZAF", "710"),
    Country::new("South Georgia and the South Sandwich Islands", "GS", "SGS", "239"),
    Country::new("South Sudan", "SS", "SSD", "728"),
    Country::new("Spain", "ES", "ESP", "724"),
    Country::new("Sri Lanka", "LK", "LKA", "144"),
    Country::new("Sudan", "SD", "SDN", "729"),
    Country::new("Suriname", "SR", "SUR", "740"),
    Country::new("Svalbard and Jan Mayen", "SJ", "SJM", "744"),
    Country::new("Swaziland", "SZ", "SWZ", "748"),
    Country::new("Sweden", "SE", "SWE", "752"),
    Country::new("Switzerland", "CH", "CHE", "756"),
    Country::new("Syrian Arab Republic", "SY", "SYR", "760"),
    Country::new("Taiwan, Province of China[a]", "TW", "TWN", "158"),
    Country::new("Tajikistan", "TJ", "TJK", "762"),
    Country::new("Tanzania, United Republic of", "TZ", "TZA", "834"),
    Country::new("Thailand", "TH", "THA", "764"),
    Country::new("Timor-Leste", "TL", "TLS", "626"),
    Country::new("Togo", "TG", "TGO", "768"),
    Country::new("Tokelau", "TK", "TKL", "772"),
    Country::new("Tonga", "TO", "TON", "776"),
    Country::new("Trinidad and Tobago", "TT", "TTO", "780"),
    Country::new("Tunisia", "TN", "TUN", "788"),
    Country::new("Turkey", "TR", "TUR", "792"),
    Country::new("Turkmenistan", "TM", "TKM", "795"),
    Country::new("Turks and Caicos Islands", "TC", "TCA", "796"),
    Country::new("Tuvalu", "TV", "TUV", "798"),
    Country::new("Uganda", "UG", "UGA", "800"),
    Country::new("Ukraine", "UA", "UKR", "804"),
    Country::new("United Arab Emirates", "AE", "ARE", "784"),
    Country::new("United Kingdom of Great Britain and Northern Ireland", "GB", "GBR", "826"),
    Country::new("United Kingdom of Great Britain and Northern Ireland", "UK", "GBR", "826"),
    Country::new("United States of America", "US", "USA", "840"),
    Country::new("United States Minor Outlying Islands", "UM", "UMI", "581"),
    Country::new("Uruguay", "UY", "URY", "858"),
    Country::new("Uzbekistan", "UZ", "UZB", "860"),
    Country::new("Vanuatu", "VU", "VUT", "548"),
    Country::new("Venezuela (Bolivarian Republic of)", "VE", "VEN", "862"),
    Country::new("Viet Nam", "VN", "VNM", "704"),
    Country::new("Virgin Islands (British)", "VG", "VGB", "092"),
    Country::new("Virgin Islands (U.S.)", "VI", "VIR", "850"),
    Country::new("Wallis and Futuna", "WF", "WLF", "876"),
    Country::new("Western Sahara", "EH", "ESH", "732"),
    Country::new("Yemen", "YE", "YEM", "887"),
    Country::new("Zambia", "ZM", "ZMB", "894"),
    Country::new("Zimbabwe", "ZW", "ZWE", "716"),
];
