// pod-core/src/rdf/vocab.rs
//! IRIs of the vocabularies the pod documents are written in.

pub mod rdf {
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const LIST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#List";
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
    pub const LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
}

pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
}

pub mod pim {
    pub const PREFERENCES_FILE: &str = "http://www.w3.org/ns/pim/space#preferencesFile";
    pub const CONFIGURATION_FILE: &str = "http://www.w3.org/ns/pim/space#ConfigurationFile";
    pub const SHARED_WORKSPACE: &str = "http://www.w3.org/ns/pim/space#SharedWorkspace";
}

pub mod solid {
    pub const PRIVATE_TYPE_INDEX: &str = "http://www.w3.org/ns/solid/terms#privateTypeIndex";
    pub const TYPE_INDEX: &str = "http://www.w3.org/ns/solid/terms#TypeIndex";
    pub const UNLISTED_DOCUMENT: &str = "http://www.w3.org/ns/solid/terms#UnlistedDocument";
    pub const TYPE_REGISTRATION: &str = "http://www.w3.org/ns/solid/terms#TypeRegistration";
    pub const FOR_CLASS: &str = "http://www.w3.org/ns/solid/terms#forClass";
    pub const INSTANCE: &str = "http://www.w3.org/ns/solid/terms#instance";
    pub const INSTANCE_CONTAINER: &str = "http://www.w3.org/ns/solid/terms#instanceContainer";
}

pub mod ldp {
    pub const RESOURCE: &str = "http://www.w3.org/ns/ldp#Resource";
    pub const BASIC_CONTAINER: &str = "http://www.w3.org/ns/ldp#BasicContainer";
    pub const CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";
}

pub mod schema {
    pub const CONVERSATION: &str = "https://schema.org/Conversation";
    pub const HAS_PART: &str = "https://schema.org/hasPart";
    pub const IS_PART_OF: &str = "https://schema.org/isPartOf";
}

pub mod prof {
    pub const RESOURCE_DESCRIPTOR: &str = "http://www.w3.org/ns/dx/prof/ResourceDescriptor";
    pub const HAS_RESOURCE: &str = "http://www.w3.org/ns/dx/prof/hasResource";
    pub const HAS_ROLE: &str = "http://www.w3.org/ns/dx/prof/hasRole";
}

pub mod foaf {
    pub const ACCOUNT_SERVICE_HOMEPAGE: &str = "http://xmlns.com/foaf/0.1/accountServiceHomepage";
}
