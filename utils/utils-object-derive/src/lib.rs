//! # Kernel Object Derive
//!
//! Implements `plan_frontier::KernelObject` for the declaration structs of a
//! project model, so the accountant can take them directly.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, parse_macro_input, spanned::Spanned};

/// Derive `plan_frontier::KernelObject`.
///
/// - The object kind is mandatory: `#[object(kind = Thread)]` on the struct,
///   naming a variant of `plan_frontier::ObjectKind`.
/// - The diagnostic name comes from the field marked `#[object(name)]`, or the
///   field called `name`. It must deref to `str`.
/// - The capability request comes from the field marked `#[object(cap)]`, or
///   the field called `cap`, of type `plan_frontier::CapRequest`. Without one
///   the object is always auto-placed.
///
/// # Example
///
/// ```
/// use plan_frontier::{CapRequest, KernelObject, ObjectKind};
/// use utils_object_derive::KernelObject;
///
/// #[derive(KernelObject)]
/// #[object(kind = Receive)]
/// struct Endpoint {
///     #[object(name)]
///     label: String,
///     cap: CapRequest,
/// }
///
/// let ep = Endpoint { label: "uart_rx".into(), cap: CapRequest::Fixed(3) };
/// assert_eq!(ep.kind(), ObjectKind::Receive);
/// assert_eq!(ep.name(), "uart_rx");
/// assert_eq!(ep.cap_request(), CapRequest::Fixed(3));
/// ```
#[proc_macro_derive(KernelObject, attributes(object))]
pub fn derive_kernel_object(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        attrs,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            other => {
                return syn::Error::new(other.span(), "KernelObject needs named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "KernelObject can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let kind = match object_kind(&attrs) {
        Ok(Some(kind)) => kind,
        Ok(None) => {
            return syn::Error::new(ident.span(), "missing #[object(kind = ...)]")
                .to_compile_error()
                .into();
        }
        Err(e) => return e.to_compile_error().into(),
    };

    let mut name_field = None;
    let mut cap_field = None;
    for field in &fields {
        let Some(fname) = &field.ident else { continue };
        let (is_name, is_cap) = match field_role(&field.attrs) {
            Ok(role) => role,
            Err(e) => return e.to_compile_error().into(),
        };
        if is_name || (name_field.is_none() && fname == "name") {
            name_field = Some(fname.clone());
        }
        if is_cap || (cap_field.is_none() && fname == "cap") {
            cap_field = Some(fname.clone());
        }
    }

    let Some(name_field) = name_field else {
        return syn::Error::new(ident.span(), "KernelObject needs a `name` or #[object(name)] field")
            .to_compile_error()
            .into();
    };

    let cap_request = cap_field.map(|f| {
        quote! {
            #[inline]
            fn cap_request(&self) -> ::plan_frontier::CapRequest {
                self.#f
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let expanded = quote! {
        impl #impl_generics ::plan_frontier::KernelObject for #ident #ty_generics #where_clause {
            #[inline]
            fn kind(&self) -> ::plan_frontier::ObjectKind {
                ::plan_frontier::ObjectKind::#kind
            }

            #[inline]
            fn name(&self) -> &str {
                &self.#name_field
            }

            #cap_request
        }
    };

    TokenStream::from(expanded)
}

/// `#[object(kind = Thread)]` on the struct.
fn object_kind(attrs: &[Attribute]) -> syn::Result<Option<Ident>> {
    let mut kind = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("object")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                kind = Some(meta.value()?.parse::<Ident>()?);
                Ok(())
            } else {
                Err(meta.error("expected `kind = <ObjectKind variant>`"))
            }
        })?;
    }
    Ok(kind)
}

/// `#[object(name)]` / `#[object(cap)]` on a field.
fn field_role(attrs: &[Attribute]) -> syn::Result<(bool, bool)> {
    let mut name = false;
    let mut cap = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("object")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = true;
            } else if meta.path.is_ident("cap") {
                cap = true;
            } else {
                return Err(meta.error("expected `name` or `cap`"));
            }
            Ok(())
        })?;
    }
    Ok((name, cap))
}
