//! Built-in dictionary: the standard attribute space of RFC 2865,
//! RFC 2866, RFC 2868, RFC 2869 and RFC 3162, plus the Ascend vendor.
//! Dictionary files loaded at startup extend this set.

use crate::dict::{AttributeTemplate, Dictionary, Vendor};
use crate::attribute::{VENDOR_NONE, value::DataType};

// (type, name, data type, tagged)
const STANDARD: &[(u32, &str, &str, bool)] = &[
    (1, "User-Name", "string", false),
    (2, "User-Password", "string", false),
    (3, "CHAP-Password", "octets", false),
    (4, "NAS-IP-Address", "ipaddr", false),
    (5, "NAS-Port", "integer", false),
    (6, "Service-Type", "integer", false),
    (7, "Framed-Protocol", "integer", false),
    (8, "Framed-IP-Address", "ipaddr", false),
    (9, "Framed-IP-Netmask", "ipaddr", false),
    (10, "Framed-Routing", "integer", false),
    (11, "Filter-Id", "string", false),
    (12, "Framed-MTU", "integer", false),
    (13, "Framed-Compression", "integer", false),
    (14, "Login-IP-Host", "ipaddr", false),
    (15, "Login-Service", "integer", false),
    (16, "Login-TCP-Port", "integer", false),
    (18, "Reply-Message", "string", false),
    (19, "Callback-Number", "string", false),
    (20, "Callback-Id", "string", false),
    (22, "Framed-Route", "string", false),
    (23, "Framed-IPX-Network", "integer", false),
    (24, "State", "octets", false),
    (25, "Class", "octets", false),
    (26, "Vendor-Specific", "vsa", false),
    (27, "Session-Timeout", "integer", false),
    (28, "Idle-Timeout", "integer", false),
    (29, "Termination-Action", "integer", false),
    (30, "Called-Station-Id", "string", false),
    (31, "Calling-Station-Id", "string", false),
    (32, "NAS-Identifier", "string", false),
    (33, "Proxy-State", "octets", false),
    (34, "Login-LAT-Service", "string", false),
    (35, "Login-LAT-Node", "string", false),
    (36, "Login-LAT-Group", "octets", false),
    (37, "Framed-AppleTalk-Link", "integer", false),
    (38, "Framed-AppleTalk-Network", "integer", false),
    (39, "Framed-AppleTalk-Zone", "string", false),
    (40, "Acct-Status-Type", "integer", false),
    (41, "Acct-Delay-Time", "integer", false),
    (42, "Acct-Input-Octets", "integer", false),
    (43, "Acct-Output-Octets", "integer", false),
    (44, "Acct-Session-Id", "string", false),
    (45, "Acct-Authentic", "integer", false),
    (46, "Acct-Session-Time", "integer", false),
    (47, "Acct-Input-Packets", "integer", false),
    (48, "Acct-Output-Packets", "integer", false),
    (49, "Acct-Terminate-Cause", "integer", false),
    (50, "Acct-Multi-Session-Id", "string", false),
    (51, "Acct-Link-Count", "integer", false),
    (52, "Acct-Input-Gigawords", "integer", false),
    (53, "Acct-Output-Gigawords", "integer", false),
    (55, "Event-Timestamp", "date", false),
    (60, "CHAP-Challenge", "octets", false),
    (61, "NAS-Port-Type", "integer", false),
    (62, "Port-Limit", "integer", false),
    (63, "Login-LAT-Port", "string", false),
    (64, "Tunnel-Type", "integer", true),
    (65, "Tunnel-Medium-Type", "integer", true),
    (66, "Tunnel-Client-Endpoint", "string", true),
    (67, "Tunnel-Server-Endpoint", "string", true),
    (68, "Acct-Tunnel-Connection", "string", false),
    (69, "Tunnel-Password", "string", true),
    (70, "ARAP-Password", "octets", false),
    (71, "ARAP-Features", "octets", false),
    (72, "ARAP-Zone-Access", "integer", false),
    (73, "ARAP-Security", "integer", false),
    (74, "ARAP-Security-Data", "string", false),
    (75, "Password-Retry", "integer", false),
    (76, "Prompt", "integer", false),
    (77, "Connect-Info", "string", false),
    (78, "Configuration-Token", "string", false),
    (79, "EAP-Message", "octets", false),
    (80, "Message-Authenticator", "octets", false),
    (81, "Tunnel-Private-Group-Id", "string", true),
    (82, "Tunnel-Assignment-Id", "string", true),
    (83, "Tunnel-Preference", "integer", true),
    (84, "ARAP-Challenge-Response", "octets", false),
    (85, "Acct-Interim-Interval", "integer", false),
    (86, "Acct-Tunnel-Packets-Lost", "integer", false),
    (87, "NAS-Port-Id", "string", false),
    (88, "Framed-Pool", "string", false),
    (90, "Tunnel-Client-Auth-Id", "string", true),
    (91, "Tunnel-Server-Auth-Id", "string", true),
    (95, "NAS-IPv6-Address", "ipv6addr", false),
    (96, "Framed-Interface-Id", "ifid", false),
    (97, "Framed-IPv6-Prefix", "ipv6prefix", false),
    (98, "Login-IPv6-Host", "ipv6addr", false),
    (99, "Framed-IPv6-Route", "string", false),
    (100, "Framed-IPv6-Pool", "string", false),
];

// (vendor type, name, data type)
const ASCEND: &[(u32, &str, &str)] = &[
    (214, "Ascend-Send-Secret", "string"),
    (215, "Ascend-Receive-Secret", "string"),
    (242, "Ascend-Data-Filter", "abinary"),
    (244, "Ascend-Idle-Limit", "integer"),
    (255, "Ascend-Xmit-Rate", "integer"),
];

const VALUES: &[(&str, &[(&str, u32)])] = &[
    (
        "Service-Type",
        &[
            ("Login-User", 1),
            ("Framed-User", 2),
            ("Callback-Login-User", 3),
            ("Callback-Framed-User", 4),
            ("Outbound-User", 5),
            ("Administrative-User", 6),
            ("NAS-Prompt-User", 7),
            ("Authenticate-Only", 8),
            ("Callback-NAS-Prompt", 9),
            ("Call-Check", 10),
            ("Callback-Administrative", 11),
        ],
    ),
    (
        "Framed-Protocol",
        &[
            ("PPP", 1),
            ("SLIP", 2),
            ("ARAP", 3),
            ("Gandalf-SLML", 4),
            ("Xylogics-IPX-SLIP", 5),
            ("X.75-Synchronous", 6),
        ],
    ),
    (
        "Login-Service",
        &[
            ("Telnet", 0),
            ("Rlogin", 1),
            ("TCP-Clear", 2),
            ("PortMaster", 3),
            ("LAT", 4),
        ],
    ),
    ("Termination-Action", &[("Default", 0), ("RADIUS-Request", 1)]),
    (
        "Acct-Status-Type",
        &[
            ("Start", 1),
            ("Stop", 2),
            ("Interim-Update", 3),
            ("Accounting-On", 7),
            ("Accounting-Off", 8),
        ],
    ),
    ("Acct-Authentic", &[("RADIUS", 1), ("Local", 2), ("Remote", 3)]),
    (
        "Acct-Terminate-Cause",
        &[
            ("User-Request", 1),
            ("Lost-Carrier", 2),
            ("Lost-Service", 3),
            ("Idle-Timeout", 4),
            ("Session-Timeout", 5),
            ("Admin-Reset", 6),
            ("Admin-Reboot", 7),
            ("Port-Error", 8),
            ("NAS-Error", 9),
            ("NAS-Request", 10),
            ("NAS-Reboot", 11),
            ("Port-Unneeded", 12),
            ("Port-Preempted", 13),
            ("Port-Suspended", 14),
            ("Service-Unavailable", 15),
            ("Callback", 16),
            ("User-Error", 17),
            ("Host-Request", 18),
        ],
    ),
    (
        "NAS-Port-Type",
        &[
            ("Async", 0),
            ("Sync", 1),
            ("ISDN", 2),
            ("ISDN-V120", 3),
            ("ISDN-V110", 4),
            ("Virtual", 5),
            ("PIAFS", 6),
            ("HDLC-Clear-Channel", 7),
            ("X.25", 8),
            ("X.75", 9),
            ("G.3-Fax", 10),
            ("SDSL", 11),
            ("ADSL-CAP", 12),
            ("ADSL-DMT", 13),
            ("IDSL", 14),
            ("Ethernet", 15),
            ("xDSL", 16),
            ("Cable", 17),
            ("Wireless-Other", 18),
            ("Wireless-802.11", 19),
        ],
    ),
    (
        "Tunnel-Type",
        &[
            ("PPTP", 1),
            ("L2F", 2),
            ("L2TP", 3),
            ("ATMP", 4),
            ("VTP", 5),
            ("AH", 6),
            ("IP-IP", 7),
            ("MIN-IP-IP", 8),
            ("ESP", 9),
            ("GRE", 10),
            ("DVS", 11),
        ],
    ),
    (
        "Tunnel-Medium-Type",
        &[
            ("IPv4", 1),
            ("IPv6", 2),
            ("NSAP", 3),
            ("HDLC", 4),
            ("BBN-1822", 5),
            ("802", 6),
        ],
    ),
];

pub(super) fn populate(dict: &mut Dictionary) {
    for (kind, name, data_type, tagged) in STANDARD {
        let mut template =
            AttributeTemplate::new(VENDOR_NONE, *kind, *name, DataType::from_name(data_type));
        if *tagged {
            template = template.with_tag();
        }

        dict.insert_template(template)
            .expect("built-in attribute table is consistent");
    }

    dict.insert_vendor(Vendor::new(529, "Ascend"))
        .expect("built-in vendor table is consistent");
    for (kind, name, data_type) in ASCEND {
        dict.insert_template(AttributeTemplate::new(
            529,
            *kind,
            *name,
            DataType::from_name(data_type),
        ))
        .expect("built-in attribute table is consistent");
    }

    for (attribute, values) in VALUES {
        for (name, value) in *values {
            dict.insert_value(attribute, name, *value)
                .expect("built-in value table is consistent");
        }
    }
}
