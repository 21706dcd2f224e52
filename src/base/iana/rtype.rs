//! Resource Record (RR) TYPEs

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource Record Types.
    ///
    /// Each resource records has a 16 bit type value indicating what kind of
    /// information is represented by the record. Normal query includes the
    /// type of record information is requested for. A few aditional types,
    /// called query types, are defined as well and can only be used in
    /// questions.
    ///
    /// Only the types the query engine has to know about are named here:
    /// the common address and delegation types, the types whose record data
    /// contains domain names that may be compressed on the wire, and the
    /// DNSSEC types a resolver routinely asks for. Any other value can be
    /// used through [`Rtype::from_int`].
    ///
    /// See the [IANA registry] for the complete list of assigned values.
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-4
    =>
    Rtype, u16;

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias.
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Mail exchange.
    (MX => 15, "MX")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    (AAAA => 28, "AAAA")

    /// Server selection.
    (SRV => 33, "SRV")

    /// Delegation name.
    (DNAME => 39, "DNAME")

    /// Option.
    ///
    /// The pseudo-record type carrying EDNS information, see [RFC 6891].
    ///
    /// [RFC 6891]: https://tools.ietf.org/html/rfc6891
    (OPT => 41, "OPT")

    /// Delegation signer.
    (DS => 43, "DS")

    /// RRSIG.
    (RRSIG => 46, "RRSIG")

    /// NSEC.
    (NSEC => 47, "NSEC")

    /// DNSKEY.
    (DNSKEY => 48, "DNSKEY")

    /// NSEC3.
    (NSEC3 => 50, "NSEC3")

    /// General-purpose service binding.
    (SVCB => 64, "SVCB")

    /// SVCB-compatible type for use with HTTPS.
    (HTTPS => 65, "HTTPS")

    /// A request for a transfer of an entire zone.
    (AXFR => 252, "AXFR")

    /// A request for all records the server/cache has available.
    (ANY => 255, "ANY")
}

int_enum_str_with_prefix!(Rtype, "TYPE", u16, "unknown record type");

impl Rtype {
    /// Returns whether the type is a pseudo type that never lives in a zone.
    #[must_use]
    pub fn is_pseudo(self) -> bool {
        self == Rtype::OPT
    }
}

//============ Tests =========================================================
