//! DNS EDNS0 option codes.

//------------ OptionCode ----------------------------------------------------

int_enum! {
    /// DNS EDNS0 option codes.
    ///
    /// The record data of OPT records is a sequence of options. The type of
    /// each of these options is given through a 16 bit value called *option
    /// code.*
    ///
    /// The currently assigned option codes can be found in the
    /// [IANA registry].
    ///
    /// [IANA registry]: http://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-11
    =>
    OptionCode, u16;

    /// Name server identifier (NSID, 3).
    ///
    /// The options in defined in [RFC 5001].
    ///
    /// [RFC 5001]: https://tools.ietf.org/html/rfc5001
    (NSID => 3, "NSID")

    /// Client subnet (8).
    ///
    /// The client subnet option allows a resolver to pass on information
    /// about the network a query originated from. The option is defined in
    /// [RFC 7871].
    ///
    /// [RFC 7871]: https://tools.ietf.org/html/rfc7871
    (CLIENT_SUBNET => 8, "edns-client-subnet")

    /// Cookie (10).
    ///
    /// The option is defined in [RFC 7873].
    ///
    /// [RFC 7873]: https://tools.ietf.org/html/rfc7873
    (COOKIE => 10, "COOKIE")

    /// TCP keepalive (11).
    ///
    /// The option is defined in [RFC 7828].
    ///
    /// [RFC 7828]: https://tools.ietf.org/html/rfc7828
    (TCP_KEEPALIVE => 11, "edns-tcp-keepalive")

    /// Padding (12).
    ///
    /// The padding option allows to artificially inflate the size of a DNS
    /// message to make traffic analysis of encrypted transports harder. It
    /// is defined in [RFC 7830].
    ///
    /// [RFC 7830]: https://tools.ietf.org/html/rfc7830
    (PADDING => 12, "Padding")

    /// Extended DNS error (15).
    ///
    /// The option is defined in [RFC 8914].
    ///
    /// [RFC 8914]: https://tools.ietf.org/html/rfc8914
    (EXTENDED_ERROR => 15, "Extended DNS Error")
}

int_enum_str_with_decimal!(OptionCode, u16, "unknown option code");
